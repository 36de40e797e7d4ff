use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{
    Aggregate, AggregateRoot, Currency, LedgerError, OrganizerId, PayeeId, Percentage, SaleId,
};
use feeledger_events::Event;
use feeledger_fees::FeeBreakdown;

pub const SALE_STREAM_TYPE: &str = "sales.sale";

/// Aggregate root: the fees assessed on one sale.
///
/// The original breakdown is immutable. Refunds only raise the cumulative
/// `refunded_fraction`, and the effective fees are always recomputed from the
/// original, so repeated or reordered refunds converge on the same numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleFees {
    id: SaleId,
    organizer_id: Option<OrganizerId>,
    payee_id: Option<PayeeId>,
    commission_rate: Option<Percentage>,
    country_code: String,
    provider_id: String,
    quantity: i64,
    fees: Option<FeeBreakdown>,
    refunded_fraction: Decimal,
    version: u64,
    created: bool,
}

impl SaleFees {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            organizer_id: None,
            payee_id: None,
            commission_rate: None,
            country_code: String::new(),
            provider_id: String::new(),
            quantity: 0,
            fees: None,
            refunded_fraction: Decimal::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn organizer_id(&self) -> Option<OrganizerId> {
        self.organizer_id
    }

    pub fn payee_id(&self) -> Option<PayeeId> {
        self.payee_id
    }

    pub fn commission_rate(&self) -> Option<Percentage> {
        self.commission_rate
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn currency(&self) -> Option<&Currency> {
        self.fees.as_ref().map(|f| &f.currency)
    }

    /// Breakdown as assessed at sale time.
    pub fn original_fees(&self) -> Option<&FeeBreakdown> {
        self.fees.as_ref()
    }

    pub fn refunded_fraction(&self) -> Decimal {
        self.refunded_fraction
    }

    /// Breakdown after refunds: `original × (1 − refunded_fraction)`.
    pub fn effective_fees(&self) -> Option<FeeBreakdown> {
        let fees = self.fees.as_ref()?;
        fees.retained(self.refunded_fraction).ok()
    }
}

impl AggregateRoot for SaleFees {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AssessSale. Fees are computed by the caller with the shared
/// `FeeCalculator` so preview and recording price identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessSale {
    pub sale_id: SaleId,
    pub organizer_id: OrganizerId,
    pub payee_id: Option<PayeeId>,
    pub commission_rate: Option<Percentage>,
    pub country_code: String,
    pub provider_id: String,
    pub quantity: i64,
    pub fees: FeeBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyRefund (cumulative fraction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRefund {
    pub sale_id: SaleId,
    pub refunded_fraction: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    AssessSale(AssessSale),
    ApplyRefund(ApplyRefund),
}

/// Event: SaleAssessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleAssessed {
    pub sale_id: SaleId,
    pub organizer_id: OrganizerId,
    pub payee_id: Option<PayeeId>,
    pub commission_rate: Option<Percentage>,
    pub country_code: String,
    pub provider_id: String,
    pub quantity: i64,
    pub fees: FeeBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleFeesReduced. `fees` is the effective breakdown after the refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFeesReduced {
    pub sale_id: SaleId,
    pub refunded_fraction: Decimal,
    pub fees: FeeBreakdown,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleAssessed(SaleAssessed),
    SaleFeesReduced(SaleFeesReduced),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleAssessed(_) => "sales.sale.assessed",
            SaleEvent::SaleFeesReduced(_) => "sales.sale.fees_reduced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleAssessed(e) => e.occurred_at,
            SaleEvent::SaleFeesReduced(e) => e.occurred_at,
        }
    }
}

impl SaleEvent {
    pub fn sale_id(&self) -> SaleId {
        match self {
            SaleEvent::SaleAssessed(e) => e.sale_id,
            SaleEvent::SaleFeesReduced(e) => e.sale_id,
        }
    }
}

impl Aggregate for SaleFees {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleAssessed(e) => {
                self.id = e.sale_id;
                self.organizer_id = Some(e.organizer_id);
                self.payee_id = e.payee_id;
                self.commission_rate = e.commission_rate;
                self.country_code = e.country_code.clone();
                self.provider_id = e.provider_id.clone();
                self.quantity = e.quantity;
                self.fees = Some(e.fees.clone());
                self.refunded_fraction = Decimal::ZERO;
                self.created = true;
            }
            SaleEvent::SaleFeesReduced(e) => {
                self.refunded_fraction = e.refunded_fraction;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::AssessSale(cmd) => self.handle_assess(cmd),
            SaleCommand::ApplyRefund(cmd) => self.handle_refund(cmd),
        }
    }
}

impl SaleFees {
    fn handle_assess(&self, cmd: &AssessSale) -> Result<Vec<SaleEvent>, LedgerError> {
        if self.created {
            return Err(LedgerError::DuplicateSale(cmd.sale_id));
        }
        if cmd.quantity < 1 {
            return Err(LedgerError::negative("quantity must be at least 1"));
        }
        if cmd.fees.subtotal < Decimal::ZERO {
            return Err(LedgerError::negative("subtotal must not be negative"));
        }

        Ok(vec![SaleEvent::SaleAssessed(SaleAssessed {
            sale_id: cmd.sale_id,
            organizer_id: cmd.organizer_id,
            payee_id: cmd.payee_id,
            commission_rate: cmd.commission_rate,
            country_code: cmd.country_code.clone(),
            provider_id: cmd.provider_id.clone(),
            quantity: cmd.quantity,
            fees: cmd.fees.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund(&self, cmd: &ApplyRefund) -> Result<Vec<SaleEvent>, LedgerError> {
        ensure_refund_fraction(cmd.refunded_fraction)?;
        let Some(fees) = self.fees.as_ref().filter(|_| self.created) else {
            return Err(LedgerError::UnknownSale(cmd.sale_id));
        };

        // Cumulative: anything at or below what was already applied is a retry.
        if cmd.refunded_fraction <= self.refunded_fraction {
            return Ok(Vec::new());
        }

        Ok(vec![SaleEvent::SaleFeesReduced(SaleFeesReduced {
            sale_id: cmd.sale_id,
            refunded_fraction: cmd.refunded_fraction,
            fees: fees.retained(cmd.refunded_fraction)?,
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// A refunded fraction must lie in `(0, 1]`.
pub fn ensure_refund_fraction(fraction: Decimal) -> Result<(), LedgerError> {
    if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
        return Err(LedgerError::negative(format!(
            "refunded fraction {fraction} is outside (0, 1]"
        )));
    }
    Ok(())
}
