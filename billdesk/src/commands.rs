//! One-shot subcommands, plus the session operations the interactive menu shares with them.
//!
//! Every write goes to the registry the session is bound to and is followed by a refresh from that same registry, so
//! what is printed is what the registry now holds.
use std::fmt::Write;

use anyhow::{anyhow, bail, Result};
use billdesk_common::{LocalAmount, RefAmount};
use billdesk_engine::{
    registry_types::{ClientStatus, OperatorId, PaymentEntry, PaymentMethod, RegistryKey},
    ConversionRound,
    LookupError,
    ResolvedSession,
};
use dialoguer::Confirm;
use log::*;

use crate::{
    desk::Desk,
    formatting::{
        format_client,
        format_invoices,
        format_matches,
        format_operators,
        format_payments,
        format_plan_prices,
        format_rate,
    },
    progress::spinner,
    ClientSelector,
    ConvertParams,
    PayParams,
    StatusTarget,
};

//--------------------------------------   Shared operations   --------------------------------------------------------

/// What an operator fills in to record a payment. Missing amounts are completed from the current rate.
#[derive(Debug, Clone)]
pub struct PaymentForm {
    pub amount_reference: Option<RefAmount>,
    pub amount_local: Option<LocalAmount>,
    pub method: PaymentMethod,
    pub reference: String,
    pub received_by: Option<OperatorId>,
    pub comment: Option<String>,
}

/// Turns the form into a payment entry. The operator signed in to the session's registry is used as the creator and,
/// when the form does not name one, as the receiver.
pub async fn prepare_payment(desk: &Desk, session: &ResolvedSession, form: PaymentForm) -> Result<PaymentEntry> {
    let (amount_reference, amount_local) = match (form.amount_reference, form.amount_local) {
        (Some(r), Some(l)) => (r.round_cents(), l.round_cents()),
        (r, l) => begin_round(desk).await?.complete(r, l)?,
    };
    let me = match desk.lookup().who_am_i(session.registry_key()).await {
        Ok(me) => Some(me.id),
        Err(e) if e.is_auth_required() => return Err(e.into()),
        Err(e) => {
            warn!("💰️ Could not identify the signed-in operator at {}. {e}", session.registry_key());
            None
        },
    };
    let received_by = form
        .received_by
        .or_else(|| me.clone())
        .ok_or_else(|| anyhow!("Could not tell who received the payment. Name the operator explicitly."))?;
    let mut entry = PaymentEntry::new(amount_reference, amount_local, form.method, received_by, form.reference);
    if let Some(comment) = form.comment {
        entry = entry.with_comment(comment);
    }
    if let Some(me) = me {
        entry = entry.with_creator(me);
    }
    Ok(entry)
}

pub async fn begin_round(desk: &Desk) -> Result<ConversionRound> {
    let pb = spinner("Fetching the current exchange rate...");
    let round = desk.rates()?.begin_round().await;
    pb.finish_and_clear();
    Ok(round?)
}

/// Records the payment, then refreshes the session so the new balance is shown.
pub async fn record_and_refresh(desk: &Desk, session: &mut ResolvedSession, entry: PaymentEntry) -> Result<String> {
    let pb = spinner(format!("Recording payment at {}...", session.registry_key()));
    let result = desk.payments().record_payment(session, entry).await;
    pb.finish_and_clear();
    let record = result?;
    let mut f = String::new();
    writeln!(f, "Payment recorded at {}", session.registry_key())?;
    writeln!(f, "{}", format_payments(std::slice::from_ref(&record)))?;
    write!(f, "{}", refresh_summary(desk, session).await?)?;
    Ok(f)
}

pub async fn set_status_and_refresh(
    desk: &Desk,
    session: &mut ResolvedSession,
    target: StatusTarget,
) -> Result<String> {
    let status = match target {
        StatusTarget::Active => {
            desk.payments().set_status(session, ClientStatus::Active).await?;
            ClientStatus::Active
        },
        StatusTarget::Suspended => {
            desk.payments().set_status(session, ClientStatus::Suspended).await?;
            ClientStatus::Suspended
        },
        StatusTarget::Toggle => desk.payments().toggle_status(session).await?,
    };
    let mut f = String::new();
    writeln!(f, "{} (#{}) is now {status}", session.client().name, session.client_id())?;
    write!(f, "{}", refresh_summary(desk, session).await?)?;
    Ok(f)
}

pub async fn resend_receipt(desk: &Desk, session: &ResolvedSession) -> Result<String> {
    let payment = desk.payments().resend_last_receipt(session).await?;
    Ok(format!("Receipt resent for\n{}", format_payments(std::slice::from_ref(&payment))))
}

pub async fn last_payment(desk: &Desk, session: &ResolvedSession) -> Result<String> {
    let payment = desk.lookup().last_payment(session).await?;
    Ok(match payment {
        Some(p) => format_payments(std::slice::from_ref(&p)),
        None => "No payments".to_string(),
    })
}

pub async fn invoices(desk: &Desk, session: &ResolvedSession) -> Result<String> {
    let invoices = desk.lookup().list_invoices(session).await?;
    Ok(format_invoices(&invoices))
}

/// A refresh after a write. A failed refresh does not undo the write, so it is reported rather than returned.
async fn refresh_summary(desk: &Desk, session: &mut ResolvedSession) -> Result<String> {
    match desk.lookup().refresh(session).await {
        Ok(client) => Ok(format!("Balance: {}. Status: {}", client.balance, client.status)),
        Err(e @ LookupError::ClientVanished { .. }) => Err(e.into()),
        Err(e) => {
            warn!("Refresh after a write failed. {e}");
            Ok(format!("The change was accepted, but the subscriber could not be re-read. {e}"))
        },
    }
}

pub async fn rate(desk: &Desk) -> Result<String> {
    let rates = desk.rates()?;
    let rate = rates.fetch_rate().await?;
    let effective = rates.converter().effective_rate(&rate)?;
    Ok(format_rate(&rate, effective, rates.converter().markup()))
}

pub async fn plan_prices(desk: &Desk) -> Result<String> {
    let rates = desk.rates()?;
    let rate = rates.fetch_rate().await?;
    let prices = rates.converter().plan_prices(&rate)?;
    Ok(format_plan_prices(Some(&rate), &prices))
}

pub async fn operators(desk: &Desk, registry: &str) -> Result<String> {
    let key = RegistryKey::from(registry.trim());
    let me = desk
        .lookup()
        .who_am_i(&key)
        .await
        .map_err(|e| warn!("Could not identify the signed-in operator at {key}. {e}"))
        .ok();
    let all = desk.lookup().list_operators(&key).await?;
    Ok(format_operators(me.as_ref(), &all))
}

//--------------------------------------  One-shot commands   ---------------------------------------------------------

pub async fn search(desk: &Desk, selector: &ClientSelector) -> Result<String> {
    let session = resolve(desk, selector).await?;
    Ok(format_matches(&session))
}

pub async fn show(desk: &Desk, selector: &ClientSelector) -> Result<String> {
    let session = resolve(desk, selector).await?;
    format_client(session.registry_key(), session.client())
}

pub async fn show_invoices(desk: &Desk, selector: &ClientSelector) -> Result<String> {
    let session = resolve(desk, selector).await?;
    invoices(desk, &session).await
}

pub async fn pay(desk: &Desk, params: PayParams) -> Result<String> {
    let mut session = resolve(desk, &params.client).await?;
    let form = PaymentForm {
        amount_reference: params.amount_reference,
        amount_local: params.amount_local,
        method: params.method,
        reference: params.reference,
        received_by: params.received_by.map(OperatorId::from),
        comment: params.comment,
    };
    let entry = prepare_payment(desk, &session, form).await?;
    if !params.yes {
        let prompt = format!(
            "Record {} ({}) by {} for {} (#{}) at {}?",
            entry.amount_reference,
            entry.amount_local,
            entry.method,
            session.client().name,
            session.client_id(),
            session.registry_key()
        );
        if !Confirm::new().with_prompt(prompt).interact()? {
            bail!("Cancelled");
        }
    }
    record_and_refresh(desk, &mut session, entry).await
}

pub async fn status(desk: &Desk, selector: &ClientSelector, target: StatusTarget) -> Result<String> {
    let mut session = resolve(desk, selector).await?;
    set_status_and_refresh(desk, &mut session, target).await
}

pub async fn resend(desk: &Desk, selector: &ClientSelector) -> Result<String> {
    let session = resolve(desk, selector).await?;
    resend_receipt(desk, &session).await
}

pub async fn convert(desk: &Desk, params: ConvertParams) -> Result<String> {
    if params.amount_reference.is_none() && params.amount_local.is_none() {
        bail!("Give an amount with --usd or --ves");
    }
    let round = begin_round(desk).await?;
    let (reference, local) = round.complete(params.amount_reference, params.amount_local)?;
    Ok(format!("{reference} = {local}  ({} at {:.4} effective)", round.rate(), round.effective_rate()?))
}

async fn resolve(desk: &Desk, selector: &ClientSelector) -> Result<ResolvedSession> {
    desk.resolve(&selector.query, &selector.registries, selector.client_id).await
}
