//! Interactive menu options.
//!
//! Commands must be unique across all menus. If the same name is used in multiple menus, the same function will be
//! called for each menu that contains the command.
pub type Menu = (&'static str, &'static [&'static str]);

// Command aliases. Keep this list in alphabetical order.
pub mod commands {
    pub const CONVERT: &str = "Convert an amount";
    pub const EXIT: &str = "Exit";
    pub const FETCH_RATE: &str = "Fetch exchange rate";
    pub const INVOICES: &str = "Invoices";
    pub const LAST_PAYMENT: &str = "Last payment";
    pub const LIST_OPERATORS: &str = "List operators";
    pub const NAV_BACK: &str = "Back";
    pub const NAV_TO_CLIENT_MENU: &str = "Subscriber Menu";
    pub const NAV_TO_RATES_MENU: &str = "Rates Menu";
    pub const PLAN_PRICES: &str = "Plan prices";
    pub const RECORD_PAYMENT: &str = "Record payment";
    pub const REFRESH: &str = "Refresh subscriber";
    pub const RESEND_RECEIPT: &str = "Resend last receipt";
    pub const SEARCH: &str = "Search subscriber";
    pub const SEARCH_IN: &str = "Search selected registries";
    pub const SET_TOKEN: &str = "Set access token";
    pub const SHOW_CLIENT: &str = "Subscriber details";
    pub const SHOW_MATCHES: &str = "Show all matches";
    pub const SWITCH_MATCH: &str = "Switch to another match";
    pub const TOGGLE_STATUS: &str = "Activate / suspend service";
}

pub use commands::*;

pub const TOP_MENU: [&str; 7] =
    [SEARCH, SEARCH_IN, NAV_TO_CLIENT_MENU, NAV_TO_RATES_MENU, LIST_OPERATORS, SET_TOKEN, EXIT];

pub const CLIENT_MENU: [&str; 13] = [
    SHOW_CLIENT,
    INVOICES,
    LAST_PAYMENT,
    RECORD_PAYMENT,
    TOGGLE_STATUS,
    RESEND_RECEIPT,
    REFRESH,
    SHOW_MATCHES,
    SWITCH_MATCH,
    SEARCH,
    NAV_TO_RATES_MENU,
    NAV_BACK,
    EXIT,
];

pub const RATES_MENU: [&str; 5] = [FETCH_RATE, CONVERT, PLAN_PRICES, NAV_BACK, EXIT];

pub fn top_menu() -> &'static Menu {
    &("Main", &TOP_MENU)
}

pub fn client_menu() -> &'static Menu {
    &("Subscriber", &CLIENT_MENU)
}

pub fn rates_menu() -> &'static Menu {
    &("Rates", &RATES_MENU)
}
