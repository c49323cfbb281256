use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, bail, Result};
use billdesk_common::{LocalAmount, RefAmount};
use billdesk_engine::{
    registry_types::{OperatorId, PaymentMethod, RegistryKey},
    ResolvedSession,
    SessionSlot,
};
use dialoguer::{console::Style, theme::ColorfulTheme, Confirm, FuzzySelect, Input, MultiSelect, Password};
use log::*;

use crate::{
    commands::{self, PaymentForm},
    desk::{explain, Desk},
    formatting::{format_client, format_matches},
    interactive::menus::{top_menu, Menu},
    progress::spinner,
    ConvertParams,
    StatusTarget,
};

pub mod menus;

use menus::commands::*;

const NO_CLIENT: &str = "No subscriber selected. Search for one first.";

fn theme() -> ColorfulTheme {
    ColorfulTheme { values_style: Style::new().yellow().dim(), ..ColorfulTheme::default() }
}

pub struct InteractiveApp {
    desk: Desk,
    slot: SessionSlot,
    current_menu: &'static Menu,
    breadcrumbs: Vec<&'static Menu>,
}

impl InteractiveApp {
    pub fn new(desk: Desk) -> Self {
        let current_menu = top_menu();
        let breadcrumbs = vec![top_menu()];
        Self { desk, slot: SessionSlot::new(), current_menu, breadcrumbs }
    }

    pub fn menu_prompt(&self) -> String {
        let breadcrumbs = self.breadcrumbs.iter().map(|m| m.0).collect::<Vec<&str>>().join(" » ");
        let status = match self.slot.current() {
            Some(s) => format!("{} (#{}) @ {}", s.client().name, s.client_id(), s.registry_key()),
            None => String::from("No subscriber selected"),
        };
        format!("{breadcrumbs:-30}{status:50}")
    }

    pub fn pop_menu(&mut self) {
        if self.breadcrumbs.len() > 1 {
            self.breadcrumbs.pop();
            self.current_menu = self.breadcrumbs.last().copied().unwrap_or_else(top_menu);
        }
    }

    pub fn select_menu(&mut self, menu: &'static Menu) {
        if std::ptr::eq(self.current_menu, menu) {
            return;
        }
        self.breadcrumbs.push(menu);
        self.current_menu = menu;
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            let theme = ColorfulTheme { prompt_style: Style::new().magenta().bold(), ..ColorfulTheme::default() };
            let i = FuzzySelect::with_theme(&theme)
                .with_prompt(self.menu_prompt())
                .items(self.current_menu.1)
                .interact()?;
            match self.current_menu.1[i] {
                SEARCH => self.search(false).await,
                SEARCH_IN => self.search(true).await,
                NAV_TO_CLIENT_MENU => self.select_menu(menus::client_menu()),
                NAV_TO_RATES_MENU => self.select_menu(menus::rates_menu()),
                LIST_OPERATORS => self.list_operators().await,
                SET_TOKEN => self.set_token(),
                SHOW_CLIENT => self.show_client(),
                SHOW_MATCHES => handle_response(self.session().map(format_matches)),
                SWITCH_MATCH => self.switch_match(),
                INVOICES => self.invoices().await,
                LAST_PAYMENT => self.last_payment().await,
                RECORD_PAYMENT => self.record_payment().await,
                TOGGLE_STATUS => self.toggle_status().await,
                RESEND_RECEIPT => self.resend_receipt().await,
                REFRESH => self.refresh().await,
                FETCH_RATE => handle_response(commands::rate(&self.desk).await),
                CONVERT => self.convert().await,
                PLAN_PRICES => handle_response(commands::plan_prices(&self.desk).await),
                NAV_BACK => self.pop_menu(),
                EXIT => break,
                _ => continue,
            }
        }
        Ok(())
    }

    fn session(&self) -> Result<&ResolvedSession> {
        self.slot.current().ok_or_else(|| anyhow!(NO_CLIENT))
    }

    async fn search(&mut self, choose_registries: bool) {
        let res = self.run_search(choose_registries).await;
        if res.is_ok() {
            self.select_menu(menus::client_menu());
        }
        handle_response(res)
    }

    async fn run_search(&mut self, choose_registries: bool) -> Result<String> {
        let theme = theme();
        let query = Input::<String>::with_theme(&theme).with_prompt("Name, national id or phone").interact_text()?;
        let candidates =
            if choose_registries { self.pick_registries(&theme)? } else { self.desk.lookup().directory().keys() };
        let ticket = self.slot.begin_search();
        let pb = spinner(format!("Searching {} registries for '{}'...", candidates.len(), query.trim()));
        let result = self.desk.lookup().search_federated(&query, &candidates).await;
        pb.finish_and_clear();
        let session = result?;
        let summary = format_matches(&session);
        if !self.slot.commit(ticket, session) {
            bail!("A newer search replaced this one");
        }
        Ok(summary)
    }

    fn pick_registries(&self, theme: &ColorfulTheme) -> Result<Vec<RegistryKey>> {
        let keys = self.desk.lookup().directory().keys();
        let labels = self.desk.lookup().directory().endpoints().iter().map(|ep| ep.to_string()).collect::<Vec<_>>();
        let chosen = MultiSelect::with_theme(theme).with_prompt("Registries to search").items(&labels).interact()?;
        if chosen.is_empty() {
            bail!("No registry selected");
        }
        Ok(chosen.into_iter().map(|i| keys[i].clone()).collect())
    }

    fn show_client(&self) {
        let res = self.session().and_then(|s| format_client(s.registry_key(), s.client()));
        handle_response(res)
    }

    fn switch_match(&mut self) {
        let res = self.pick_match();
        handle_response(res)
    }

    fn pick_match(&mut self) -> Result<String> {
        let session = self.slot.current_mut().ok_or_else(|| anyhow!(NO_CLIENT))?;
        let options = session
            .matches()
            .iter()
            .map(|c| format!("#{} {} ({})", c.id, c.name, c.identification))
            .collect::<Vec<String>>();
        let i = FuzzySelect::with_theme(&theme()).with_prompt("Select subscriber").items(&options).interact()?;
        let id = session.matches()[i].id;
        let client = session.focus(id)?;
        Ok(format!("Now working on {} (#{})", client.name, client.id))
    }

    async fn invoices(&self) {
        let res = match self.session() {
            Ok(session) => commands::invoices(&self.desk, session).await,
            Err(e) => Err(e),
        };
        handle_response(res)
    }

    async fn last_payment(&self) {
        let res = match self.session() {
            Ok(session) => commands::last_payment(&self.desk, session).await,
            Err(e) => Err(e),
        };
        handle_response(res)
    }

    async fn refresh(&mut self) {
        let res = match self.slot.current_mut() {
            Some(session) => self
                .desk
                .lookup()
                .refresh(session)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|client| format_client(session.registry_key(), &client)),
            None => Err(anyhow!(NO_CLIENT)),
        };
        handle_response(res)
    }

    async fn toggle_status(&mut self) {
        let res = self.confirm_and_toggle().await;
        handle_response(res)
    }

    async fn confirm_and_toggle(&mut self) -> Result<String> {
        let session = self.slot.current_mut().ok_or_else(|| anyhow!(NO_CLIENT))?;
        let next = session.client().status.toggled();
        let prompt = format!("Set {} (#{}) to {next}?", session.client().name, session.client_id());
        if !Confirm::with_theme(&theme()).with_prompt(prompt).interact()? {
            bail!("Cancelled");
        }
        commands::set_status_and_refresh(&self.desk, session, StatusTarget::Toggle).await
    }

    async fn resend_receipt(&self) {
        let res = match self.session() {
            Ok(session) => commands::resend_receipt(&self.desk, session).await,
            Err(e) => Err(e),
        };
        handle_response(res)
    }

    async fn record_payment(&mut self) {
        let res = self.collect_and_record().await;
        handle_response(res)
    }

    async fn collect_and_record(&mut self) -> Result<String> {
        let theme = theme();
        let session = self.slot.current_mut().ok_or_else(|| anyhow!(NO_CLIENT))?;
        let methods = PaymentMethod::ALL.iter().map(|m| m.to_string()).collect::<Vec<String>>();
        let i = FuzzySelect::with_theme(&theme).with_prompt("Payment method").items(&methods).interact()?;
        let amount_reference = optional_amount::<RefAmount>(&theme, "Amount in USD (blank to compute)")?;
        let amount_local = optional_amount::<LocalAmount>(&theme, "Amount in VES (blank to compute)")?;
        let reference = Input::<String>::with_theme(&theme).with_prompt("Reference").interact_text()?;
        let comment =
            Input::<String>::with_theme(&theme).with_prompt("Comment").allow_empty(true).interact_text()?;
        let received_by = pick_receiver(&self.desk, &theme, session.registry_key()).await?;
        let form = PaymentForm {
            amount_reference,
            amount_local,
            method: PaymentMethod::ALL[i],
            reference,
            received_by,
            comment: Some(comment).filter(|c| !c.trim().is_empty()),
        };
        let entry = commands::prepare_payment(&self.desk, session, form).await?;
        let prompt = format!(
            "Record {} ({}) by {} for {}?",
            entry.amount_reference,
            entry.amount_local,
            entry.method,
            session.client().name
        );
        if !Confirm::with_theme(&theme).with_prompt(prompt).interact()? {
            bail!("Cancelled");
        }
        commands::record_and_refresh(&self.desk, session, entry).await
    }

    async fn convert(&self) {
        let res = self.run_convert().await;
        handle_response(res)
    }

    async fn run_convert(&self) -> Result<String> {
        let theme = theme();
        let amount_reference = optional_amount::<RefAmount>(&theme, "Amount in USD (blank to convert from VES)")?;
        let amount_local = match amount_reference {
            Some(_) => None,
            None => optional_amount::<LocalAmount>(&theme, "Amount in VES")?,
        };
        commands::convert(&self.desk, ConvertParams { amount_reference, amount_local }).await
    }

    async fn list_operators(&self) {
        let keys = self.desk.lookup().directory().keys();
        let options = keys.iter().map(|k| k.to_string()).collect::<Vec<String>>();
        let res = match FuzzySelect::with_theme(&theme()).with_prompt("Registry").items(&options).interact() {
            Ok(i) => commands::operators(&self.desk, keys[i].as_str()).await,
            Err(e) => Err(e.into()),
        };
        handle_response(res)
    }

    fn set_token(&mut self) {
        let res = Password::with_theme(&theme())
            .with_prompt("Access token")
            .interact()
            .map_err(anyhow::Error::from)
            .and_then(|token| self.desk.with_token(token));
        match res {
            Ok(desk) => {
                self.desk = desk;
                info!("🔑️ Access token replaced");
                println!("Access token set");
            },
            Err(e) => println!("Error: {e:#}"),
        }
    }
}

/// `None` means the signed-in operator received the payment.
async fn pick_receiver(desk: &Desk, theme: &ColorfulTheme, registry: &RegistryKey) -> Result<Option<OperatorId>> {
    let operators = match desk.lookup().list_operators(registry).await {
        Ok(operators) if !operators.is_empty() => operators,
        Ok(_) => return Ok(None),
        Err(e) if e.is_auth_required() => return Err(e.into()),
        Err(e) => {
            warn!("Could not list the operators of {registry}. {e}");
            return Ok(None);
        },
    };
    let mut options = vec!["Me (signed-in operator)".to_string()];
    options.extend(operators.iter().map(|op| op.to_string()));
    let i = FuzzySelect::with_theme(theme).with_prompt("Received by").items(&options).default(0).interact()?;
    Ok(i.checked_sub(1).map(|i| operators[i].id.clone()))
}

fn optional_amount<T>(theme: &ColorfulTheme, prompt: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text = Input::<String>::with_theme(theme).with_prompt(prompt).allow_empty(true).interact_text()?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(text.trim().parse::<T>()?))
}

fn handle_response<T: Display>(res: Result<T>) {
    match res.map_err(explain) {
        Ok(res) => println!("{res}"),
        Err(e) => println!("Error: {e:#}"),
    }
}
