//! Chat copy and keyboards. Button labels double as command keys in the route table,
//! so they live here once and are referenced from both sides.

use chrono::{NaiveDate, NaiveDateTime};

use cargolink_core::domain::order::{CargoType, DealId, Order};
use cargolink_core::domain::session::BotRole;
use cargolink_core::domain::warehouse::Warehouse;
use cargolink_core::schedule::{format_date, Slot};
use cargolink_telegram::{CallbackIntent, InlineButton, KeyboardButton, ReplyMarkup};

pub mod commands {
    pub const START: &str = "/start";
    pub const NEW: &str = "/new";
    pub const CALC: &str = "/calc";
}

pub mod buttons {
    pub const RESTART: &str = "🔄 Начать заново";
    pub const NEW_ORDER: &str = "📦 Создать новую заявку";
    pub const CREATE_ORDER: &str = "📦 Создать заявку";
    pub const FULFILMENT_NEW_ORDER: &str = "Создать новую заявку";
    pub const CALCULATE: &str = "💰 Рассчитать стоимость";
    pub const CONTINUE: &str = "✅ Продолжить";
    pub const OTHER_INN: &str = "❌ Ввести другой ИНН";
    pub const SUBMIT: &str = "📨 Отправить заявку";
    pub const PAY_BY_INVOICE: &str = "Оплатить по счету";
    pub const PAY_BY_SBP: &str = "Оплатить по СБП";
    pub const SHARE_CONTACT: &str = "📲 Отправить контакт";
    pub const ADDRESS_PREFIX: &str = "📍 ";
    pub const PHONE_PREFIX: &str = "📞 ";
}

/// Copy that differs between the delivery and fulfilment client bots.
#[derive(Debug)]
pub struct Wording {
    pub sender: &'static str,
    pub enter_inn: &'static str,
    pub choose_org: &'static str,
    pub org_not_found: &'static str,
    pub org_found: &'static str,
    pub confirm_again: &'static str,
    pub enter_account: &'static str,
    pub org_incomplete: &'static str,
    pub summary_org: &'static str,
    pub summary_address: &'static str,
    pub missing_order: &'static str,
    pub start_button: &'static str,
}

static DELIVERY_WORDING: Wording = Wording {
    sender: "ИП / организации",
    enter_inn: "Введите ИНН ИП / компании",
    choose_org: "Выберите ИП / организацию из списка или введите ИНН ИП / компании",
    org_not_found: "❌ ИП / компания не найдена. Проверьте ИНН ИП / компании.",
    org_found: "✅ Найдена ИП / организация:",
    confirm_again: "Пожалуйста, подтвердите ИП / организацию или введите ИНН ИП / компании заново:",
    enter_account: "Введите расчётный счёт ИП / организации",
    org_incomplete:
        "Не удалось найти полностью заполнённую ИП / организацию. Введите ИНН ИП / компании",
    summary_org: "ИП / организация",
    summary_address: "Адрес ИП / организации",
    missing_order: "⚠️ Не удалось найти активный заказ. Начните заново.",
    start_button: buttons::CREATE_ORDER,
};

static FULFILMENT_WORDING: Wording = Wording {
    sender: "организации",
    enter_inn: "Введите ИНН компании",
    choose_org: "Выберите организацию из списка или введите ИНН компании",
    org_not_found: "❌ Организация не найдена. Проверьте ИНН.",
    org_found: "✅ Найдена организация:",
    confirm_again: "Пожалуйста, подтвердите организацию или введите ИНН заново:",
    enter_account: "Введите расчётный счёт организации",
    org_incomplete: "Не удалось найти полностью заполнённую организацию. Введите ИНН компании",
    summary_org: "Организация",
    summary_address: "Адрес организации",
    missing_order: "⚠️ Заказ не найден. Начните заново",
    start_button: buttons::FULFILMENT_NEW_ORDER,
};

pub fn wording(role: BotRole) -> &'static Wording {
    match role {
        BotRole::ClientFulfilment => &FULFILMENT_WORDING,
        BotRole::ClientDelivery | BotRole::Driver => &DELIVERY_WORDING,
    }
}

pub const WELCOME: &str = "Добро пожаловать в чат-бот компании Ecomdelivery.\nВыберите действие, нажав на кнопку ниже строки ввода текста:";
pub const FULFILMENT_IDLE: &str = "Нажмите кнопку «Создать новую заявку», чтобы начать";
pub const ENTER_BANK_CODE: &str = "Введите БИК";
pub const CHOOSE_WAREHOUSE: &str = "🏬 Выберите склад разгрузки:";
pub const INVALID_WAREHOUSE: &str = "❌ Некорректный выбор. Пожалуйста, выберите склад из списка:";
pub const CHOOSE_DELIVERY_DATE: &str = "📅 Выберите дату сдачи поставки:";
pub const INVALID_DATE_FORMAT: &str = "❌ Неверный формат даты. Выберите из кнопок.";
pub const NO_SLOTS: &str = "⛔ Нет доступных дат сдачи поставки на ближайшие 2 недели.";
pub const CHOOSE_PICKUP_DATE: &str = "🚚 Выберите дату забора поставки:";
pub const INVALID_PICKUP_DATE: &str = "❌ Неверная дата. Пожалуйста, выберите дату забора снова:";
pub const CHOOSE_CARGO_TYPE: &str = "📦 Выберите тип поставки:";
pub const INVALID_CHOICE: &str = "❌ Пожалуйста, выберите вариант из кнопок.";
pub const EMPTY_ADDRESS: &str = "❌ Адрес не может быть пустым. Введите корректный адрес.";
pub const CHOOSE_ADDRESS: &str = "📍 Выберите адрес забора или введите новый:";
pub const ENTER_ADDRESS: &str =
    "✏️ Введите адрес забора поставки:\n_Пример: Красногорск, ул. Карбышева, 9 к 2 под 3_";
pub const CHOOSE_PHONE: &str = "📞 Выберите номер телефона, поделитесь контактом или введите номер вручную в формате +7XXXXXXXXXX";
pub const ORDER_LOST: &str =
    "❌ Ваш заказ не найден (возможно, он был удалён). Давайте начнём сначала.";
pub const PRESS_SUBMIT: &str = "❌ Пожалуйста, нажмите «📨 Отправить заявку» или «🔄 Начать заново».";
pub const SUBMIT_FAILED: &str = "❌ Не удалось отправить заявку. Попробуйте ещё раз.";
pub const STATUS_UPDATES: &str = "📨 При изменении статуса вы получите уведомление.";

pub const CALC_CHOOSE_WAREHOUSE: &str = "🏬 Выберите место сдачи поставки:";
pub const CALC_INVALID_WAREHOUSE: &str = "Пожалуйста, выберите склад из списка.";
pub const CALC_CHOOSE_CARGO: &str = "🚛 Выберите тип поставки:";
pub const CALC_INVALID_CARGO: &str = "❗ Пожалуйста, выберите тип поставки из списка ниже:";
pub const CALC_MISSING: &str = "❗ Не найден активный расчёт. Пожалуйста, начните сначала: нажмите /calc или кнопку «💰 Рассчитать стоимость».";
pub const CALC_NEEDS_WAREHOUSE: &str = "❗ Пожалуйста, выберите склад перед вводом количества.";

pub const NOTHING_TO_INVOICE: &str =
    "❗ У вас нет заявок, ожидающих оплаты по счету, или счет уже сгенерирован.";
pub const NOTHING_FOR_SBP: &str = "❗ У вас нет заявок, ожидающих оплаты по СБП.";
pub const NO_DEAL_LINK: &str = "❗ У заявки отсутствует привязка к сделке Bitrix.";
pub const INVOICE_FAILED: &str = "❌ Не удалось сформировать счёт. Пожалуйста, попробуйте чуть позже.";
pub const SBP_TOKEN_FAILED: &str = "❌ Не удалось получить токен оплаты. Попробуйте позже.";
pub const SBP_INVOICE_FAILED: &str = "❌ Не удалось сформировать счёт СБП. Попробуйте позже.";
pub const CHOOSE_PAYMENT_METHOD: &str = "💳 Пожалуйста, выберите способ оплаты:";

pub const DRIVER_NEEDS_USERNAME: &str =
    "❗ Чтобы получать заявки, укажите username в настройках Telegram и нажмите /start ещё раз.";

pub mod driver_buttons {
    pub const PICKED_UP: &str = "Забрал";
    pub const AWAITING_QUANTITY: &str = "Ожидание уточнения количества";
    pub const PACKING: &str = "Упаковывается";
    pub const IN_TRANSIT: &str = "В доставке";
    pub const DELIVERED: &str = "Доставлено";
    pub const AWAITING_GATE: &str = "Ожидание ввода ворот";
    pub const COMPLETED: &str = "Завершено";
    pub const CANCELLED: &str = "Заявка отменена";
}

pub fn restart_keyboard() -> ReplyMarkup {
    ReplyMarkup::rows([[buttons::RESTART]])
}

/// The keyboard left behind once a cycle is over.
pub fn main_menu(role: BotRole) -> ReplyMarkup {
    match role {
        BotRole::ClientFulfilment => ReplyMarkup::rows([[buttons::FULFILMENT_NEW_ORDER]]),
        BotRole::ClientDelivery | BotRole::Driver => {
            ReplyMarkup::rows([[buttons::NEW_ORDER], [buttons::CALCULATE]])
        }
    }
}

pub fn intro_keyboard(role: BotRole) -> ReplyMarkup {
    match role {
        BotRole::ClientFulfilment => ReplyMarkup::rows([[buttons::FULFILMENT_NEW_ORDER]]),
        BotRole::ClientDelivery | BotRole::Driver => {
            ReplyMarkup::rows([[buttons::CREATE_ORDER], [buttons::RESTART]])
        }
    }
}

pub fn intro(wording: &Wording) -> String {
    format!(
        "Для создания заявки потребуется указать следующие данные:\n    - ИНН {sender} отправителя\n    - Рассчетный счет {sender} отправителя\n    - БИК\n    - Склад разгрузки\n    - Необходимая дата разгрузки\n    - Количество коробов / палет\n    - Адрес забора поставки\n    - Контактный номер телефона отправителя",
        sender = wording.sender
    )
}

pub fn org_choice_keyboard(names: &[String]) -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard.column(names.iter().cloned()).row([buttons::RESTART]);
    })
}

pub fn confirm_org_keyboard() -> ReplyMarkup {
    ReplyMarkup::rows([vec![buttons::CONTINUE, buttons::OTHER_INN], vec![buttons::RESTART]])
}

pub fn org_found(wording: &Wording, name: &str, address: &str) -> String {
    format!("{}\n{name}\nАдрес: {address}", wording.org_found)
}

pub fn warehouse_keyboard() -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard.pairs(Warehouse::ALL.iter().map(|warehouse| warehouse.name())).row([buttons::RESTART]);
    })
}

pub fn dates_keyboard(dates: &[NaiveDate]) -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard.pairs(dates.iter().copied().map(format_date)).row([buttons::RESTART]);
    })
}

pub fn cargo_keyboard() -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard.row(CargoType::ALL.iter().map(|cargo| cargo.button())).row([buttons::RESTART]);
    })
}

pub fn calc_cargo_keyboard() -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard.row(CargoType::ALL.iter().map(|cargo| cargo.label())).row([buttons::RESTART]);
    })
}

pub fn enter_quantity(unit: &str) -> String {
    format!("✏️ Введите количество {unit} (целое число)")
}

pub fn invalid_quantity(unit: &str) -> String {
    format!("❌ Введите положительное целое число {unit}")
}

pub fn address_keyboard(addresses: &[String]) -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard
            .column(addresses.iter().map(|address| format!("{}{address}", buttons::ADDRESS_PREFIX)))
            .row([buttons::RESTART]);
    })
}

pub fn phone_keyboard(phones: &[String]) -> ReplyMarkup {
    ReplyMarkup::reply(|keyboard| {
        keyboard
            .column(phones.iter().map(|phone| format!("{}{phone}", buttons::PHONE_PREFIX)))
            .buttons(vec![KeyboardButton::contact(buttons::SHARE_CONTACT)])
            .row([buttons::RESTART]);
    })
}

pub fn submit_keyboard() -> ReplyMarkup {
    ReplyMarkup::rows([[buttons::SUBMIT], [buttons::RESTART]])
}

pub fn payment_method_keyboard() -> ReplyMarkup {
    ReplyMarkup::rows([[buttons::PAY_BY_SBP, buttons::PAY_BY_INVOICE]])
}

fn field(value: Option<&str>) -> &str {
    value.filter(|value| !value.trim().is_empty()).unwrap_or("—")
}

fn date_field(value: Option<NaiveDate>) -> String {
    value.map(format_date).unwrap_or_else(|| "—".to_owned())
}

fn number_field<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_else(|| "—".to_owned())
}

fn cargo_label(order: &Order) -> &'static str {
    order.cargo_type.map(CargoType::label).unwrap_or("—")
}

/// Pre-submission summary the client confirms.
pub fn review_summary(order: &Order, wording: &Wording) -> String {
    [
        "📋 *Проверьте данные заявки:*".to_owned(),
        format!("🏢 *{}*: {}", wording.summary_org, order.org_name()),
        format!("📍 *{}*: {}", wording.summary_address, field(order.org.address.as_deref())),
        format!("💳 *Р/С*: {}", field(order.org.bank_account.as_deref())),
        format!("🏦 *БИК*: {}", field(order.org.bank_code.as_deref())),
        format!("📦 *Тип поставки*: {}", cargo_label(order)),
        format!("🔢 *Количество*: {}", number_field(order.quantity)),
        format!("🏬 *Склад*: {}", order.warehouse_name()),
        format!("📅 *Дата сдачи*: {}", date_field(order.delivery_date)),
        format!("🚚 *Дата забора*: {}", date_field(order.pickup_date)),
        format!("🏠 *Адрес забора*: {}", field(order.pickup_address.as_deref())),
        format!("📞 *Телефон*: {}", field(order.phone.as_deref())),
        format!("💰 *Стоимость*: {} ₽", number_field(order.cost)),
    ]
    .join("\n")
}

/// Summary kept in the client chat after submission; rewritten when the driver corrects quantity.
pub fn final_summary(order: &Order, wording: &Wording) -> String {
    [
        "✅ Ваша заявка успешно отправлена!".to_owned(),
        "📋 Содержимое заявки:".to_owned(),
        String::new(),
        format!("🆔 Номер заявки: #{}", order.deal_label()),
        format!("🏢 {}: {}", wording.summary_org, order.org_name()),
        format!("📍 {}: {}", wording.summary_address, field(order.org.address.as_deref())),
        format!("🏦 БИК: {}", field(order.org.bank_code.as_deref())),
        format!("💳 Р/С: {}", field(order.org.bank_account.as_deref())),
        format!("📦 Тип поставки: {}", cargo_label(order)),
        format!("🔢 Количество: {}", number_field(order.quantity)),
        format!("🏬 Склад: {}", order.warehouse_name()),
        format!("📅 Дата сдачи: {}", date_field(order.delivery_date)),
        format!("🚚 Дата забора: {}", date_field(order.pickup_date)),
        format!("🏠 Адрес забора: {}", field(order.pickup_address.as_deref())),
        format!("📞 Телефон: {}", field(order.phone.as_deref())),
        format!("💰 Стоимость: {} ₽", number_field(order.cost)),
    ]
    .join("\n")
}

pub fn calc_enter_quantity(unit: &str) -> String {
    format!("Введите количество {unit}\n_Пример: 7_")
}

pub fn calc_invalid_quantity(unit: &str) -> String {
    format!("❗ Введите корректное количество {unit} (положительное целое).\n_Пример: 7_")
}

pub fn estimate(cost: u64, slots: &[Slot]) -> String {
    let mut lines = vec![
        format!("Стоимость доставки: {cost} руб.\n"),
        "Доступные даты забора / сдачи поставки на склад:".to_owned(),
    ];
    lines.extend(
        slots
            .iter()
            .map(|slot| format!("{} / {}", format_date(slot.pickup), format_date(slot.delivery))),
    );
    lines.join("\n")
}

fn escape_html(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Order card sent to the assigned driver, HTML-formatted.
pub fn driver_card(order: &Order, client_username: &str) -> String {
    let warehouse = escape_html(order.warehouse_name());
    format!(
        "<b>Поступила новая заявка #{deal} {warehouse}</b>\nКлиент: {client}, тел: {phone}, tg: @{username}\nАдрес забора поставки: {pickup}\nМесто сдачи поставки: {warehouse}\nКоличество {unit}: {quantity}\nДата забора поставки: {pickup_date}\nДата сдачи поставки: {delivery_date}",
        deal = order.deal_label(),
        client = escape_html(order.org_name()),
        phone = escape_html(field(order.phone.as_deref())),
        username = escape_html(client_username),
        pickup = escape_html(field(order.pickup_address.as_deref())),
        unit = order.cargo_unit(),
        quantity = number_field(order.quantity),
        pickup_date = date_field(order.pickup_date),
        delivery_date = date_field(order.delivery_date),
    )
}

pub fn driver_action(label: &str, intent: CallbackIntent) -> ReplyMarkup {
    ReplyMarkup::single_inline(InlineButton::new(label, &intent))
}

pub fn driver_status(label: &str) -> ReplyMarkup {
    ReplyMarkup::single_inline(InlineButton::status(label))
}

pub fn driver_registered(username: &str) -> String {
    format!("Аккаунт @{username} успешно добавлен. Теперь новые заявки будут поступать в этот чат.")
}

pub fn enter_final_quantity(unit: &str, deal: &DealId) -> String {
    format!("Введите итоговое количество {unit} для заявки #{deal}:")
}

pub fn repeat_final_quantity(unit: &str, deal: &DealId) -> String {
    format!("❗ Введите итоговое количество {unit} для заявки #{deal} (целое число)")
}

pub fn enter_gate(deal: &DealId) -> String {
    format!("Для завершения заявки #{deal} введите номер ворот:")
}

pub fn order_updated(deal: &DealId) -> String {
    format!("Данные по заказу #{deal} успешно обновлены.")
}

pub fn order_completed(deal: &DealId) -> String {
    format!("Заявка #{deal} успешно завершена.")
}

pub fn order_cancelled(deal: &DealId) -> String {
    format!("❗ *Внимание!* Заявка #{deal} была *отменена*.")
}

fn status_header(order: &Order) -> String {
    format!("*Изменился статус Вашей заявки #{}, {}.*", order.deal_label(), order.warehouse_name())
}

pub fn driver_assigned(order: &Order, driver: &str) -> String {
    format!("{}\nТекущий статус: Обработано.\nК Вам приедет водитель {driver}", status_header(order))
}

pub fn accepted_by_driver(order: &Order) -> String {
    format!(
        "{}\nТекущий статус: Принято водителем.\nФактическое количество {}: {}\nИтоговая стоимость доставки: {} ₽",
        status_header(order),
        order.cargo_unit(),
        number_field(order.quantity),
        number_field(order.cost),
    )
}

pub fn packing(order: &Order) -> String {
    format!("{}\nТекущий статус: Упаковывается.", status_header(order))
}

pub fn in_transit(order: &Order) -> String {
    format!(
        "{}\nТекущий статус: В доставке.\n\nПроверьте правильность оформления поставки в личном кабинете WB:\n    1. Статус поставки - \"Отгрузка разрешена\".\n    2. В пропуске для водителя количество коробов должно соответствовать фактическому.",
        status_header(order)
    )
}

pub fn handed_over(order: &Order, gate: &str, at: NaiveDateTime) -> String {
    format!(
        "{}\nТекущий статус: Доставлено.\nНомер ворот: {gate}\nВремя сдачи груза: {}",
        status_header(order),
        at.format("%d.%m.%Y %H:%M")
    )
}

pub fn paid(order: &Order) -> String {
    format!(
        "{}\n*Текущий статус:* Доставлено.\n\nСпасибо, что обратились к нам. Удачных вам продаж! \nС уважением, команда Ecomdelivery.",
        status_header(order)
    )
}

pub fn invoice_ready(url: &str) -> String {
    format!("📄 Ваш счёт готов и доступен для скачивания:\n{url}")
}

pub fn sbp_link(deal: &DealId, link: &str) -> String {
    format!("🔗 Ссылка для оплаты заявки #{deal}:\n{link}")
}

pub fn payment_reminder(deal: &DealId, url: &str) -> String {
    format!(
        "⏰ *Напоминаем о необходимости оплаты заказа #{deal}.*\nПроизведите, пожалуйста, оплату доставки:\n{url}"
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use cargolink_core::domain::order::{CargoType, DealId, DealType, Order};
    use cargolink_core::domain::session::BotRole;
    use cargolink_core::domain::warehouse::Warehouse;

    use super::{
        driver_card, final_summary, intro, main_menu, review_summary, warehouse_keyboard, wording,
    };

    fn order() -> Order {
        let mut order = Order::new_draft(1, DealType::Delivery, Utc::now());
        order.org.name = Some("ООО <Ромашка>".to_owned());
        order.warehouse = Some(Warehouse::Tula);
        order.cargo_type = Some(CargoType::Pallets);
        order.quantity = Some(2);
        order.cost = Some(9_000);
        order.pickup_date = NaiveDate::from_ymd_opt(2026, 3, 4);
        order.crm_deal_id = Some(DealId("812".to_owned()));
        order
    }

    #[test]
    fn summaries_use_role_wording() {
        let order = order();
        let delivery = review_summary(&order, wording(BotRole::ClientDelivery));
        assert!(delivery.contains("🏢 *ИП / организация*: ООО <Ромашка>"));
        assert!(delivery.contains("💰 *Стоимость*: 9000 ₽"));
        assert!(delivery.contains("🏠 *Адрес забора*: —"));

        let fulfilment = final_summary(&order, wording(BotRole::ClientFulfilment));
        assert!(fulfilment.contains("🆔 Номер заявки: #812"));
        assert!(fulfilment.contains("🏢 Организация: ООО <Ромашка>"));
        assert!(fulfilment.contains("📅 Дата сдачи: —"));
        assert!(intro(wording(BotRole::ClientFulfilment)).contains("ИНН организации отправителя"));
    }

    #[test]
    fn driver_card_escapes_html_and_uses_unit() {
        let card = driver_card(&order(), "client_1");
        assert!(card.starts_with("<b>Поступила новая заявка #812 Тула</b>"));
        assert!(card.contains("Клиент: ООО &lt;Ромашка&gt;"));
        assert!(card.contains("Количество палет: 2"));
        assert!(card.contains("Дата забора поставки: 04.03.2026"));
    }

    #[test]
    fn menus_differ_by_bot() {
        assert_eq!(main_menu(BotRole::ClientFulfilment).labels(), vec!["Создать новую заявку"]);
        assert_eq!(
            main_menu(BotRole::ClientDelivery).labels(),
            vec!["📦 Создать новую заявку", "💰 Рассчитать стоимость"]
        );
        let keyboard = warehouse_keyboard();
        let labels = keyboard.labels();
        assert_eq!(labels.first(), Some(&"Коледино"));
        assert_eq!(labels.last(), Some(&"🔄 Начать заново"));
    }
}
