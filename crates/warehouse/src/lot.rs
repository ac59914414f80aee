use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{AggregateRoot, DomainError, DomainResult, ExternalOrderId, LotId, OrderId};

/// Lot state lifecycle.
///
/// A lot is tagged as a whole: reserving a single unit of a 20-unit lot makes
/// the entire lot unavailable to other orders. The quantity is never split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LotState {
    Available,
    Reserved { order_id: OrderId },
    Sold { external_order_id: ExternalOrderId },
}

impl LotState {
    pub fn kind(&self) -> LotStateKind {
        match self {
            LotState::Available => LotStateKind::Available,
            LotState::Reserved { .. } => LotStateKind::Reserved,
            LotState::Sold { .. } => LotStateKind::Sold,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, LotState::Available)
    }

    pub fn reserved_for(&self) -> Option<&OrderId> {
        match self {
            LotState::Reserved { order_id } => Some(order_id),
            _ => None,
        }
    }

    pub fn sold_in(&self) -> Option<&ExternalOrderId> {
        match self {
            LotState::Sold { external_order_id } => Some(external_order_id),
            _ => None,
        }
    }
}

/// State tag without its payload (filters, statistics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotStateKind {
    Available,
    Reserved,
    Sold,
}

impl core::str::FromStr for LotStateKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            "sold" => Ok(Self::Sold),
            other => Err(DomainError::validation(format!("unknown lot state '{other}'"))),
        }
    }
}

/// Order metadata copied onto a lot when it is reserved or sold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAudit {
    pub customer_name: String,
    #[serde(default)]
    pub sub_client_name: Option<String>,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    /// Display order number (may be patched later, see `set_order_number`).
    #[serde(default)]
    pub order_number: Option<String>,
}

impl LotAudit {
    pub fn new(customer_name: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            ..Self::default()
        }
    }

    pub fn with_sub_client(mut self, name: impl Into<String>) -> Self {
        self.sub_client_name = Some(name.into());
        self
    }

    pub fn with_order_date(mut self, date: NaiveDate) -> Self {
        self.order_date = Some(date);
        self
    }

    pub fn with_order_number(mut self, number: impl Into<String>) -> Self {
        self.order_number = Some(number.into());
        self
    }
}

/// Aggregate root: WarehouseLot (one article in one box).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseLot {
    id: LotId,
    article_code: String,
    #[serde(default)]
    description: String,
    box_label: String,
    quantity: u32,
    #[serde(default = "available")]
    state: LotState,
    #[serde(default)]
    audit: Option<LotAudit>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    version: u64,
}

fn available() -> LotState {
    LotState::Available
}

impl WarehouseLot {
    /// Create an available lot, as a stock import would.
    pub fn new(
        id: LotId,
        article_code: impl Into<String>,
        description: impl Into<String>,
        box_label: impl Into<String>,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let article_code = article_code.into();
        if article_code.trim().is_empty() {
            return Err(DomainError::validation("article_code cannot be empty"));
        }
        Ok(Self {
            id,
            article_code,
            description: description.into(),
            box_label: box_label.into(),
            quantity,
            state: LotState::Available,
            audit: None,
            updated_at: at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> &LotId {
        &self.id
    }

    pub fn article_code(&self) -> &str {
        &self.article_code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn box_label(&self) -> &str {
        &self.box_label
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn state(&self) -> &LotState {
        &self.state
    }

    pub fn audit(&self) -> Option<&LotAudit> {
        self.audit.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Stamp the version assigned by a store on save.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Available -> Reserved(order). Re-reserving for the same order refreshes the audit.
    pub fn reserve(
        &mut self,
        order_id: &OrderId,
        audit: LotAudit,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        match &self.state {
            LotState::Available => {}
            LotState::Reserved { order_id: current } if current == order_id => {}
            other => {
                return Err(DomainError::invariant(format!(
                    "lot {} cannot be reserved from state {:?}",
                    self.id,
                    other.kind()
                )));
            }
        }
        self.state = LotState::Reserved {
            order_id: order_id.clone(),
        };
        self.audit = Some(audit);
        self.updated_at = at;
        Ok(())
    }

    /// Reserved -> Available, clearing audit metadata.
    pub fn release(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.state, LotState::Reserved { .. }) {
            return Err(DomainError::invariant(format!("lot {} is not reserved", self.id)));
        }
        self.state = LotState::Available;
        self.audit = None;
        self.updated_at = at;
        Ok(())
    }

    /// Reserved -> Sold(external). `None` keeps the audit copied in at reservation time.
    pub fn mark_sold(
        &mut self,
        external_order_id: &ExternalOrderId,
        audit: Option<LotAudit>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !matches!(self.state, LotState::Reserved { .. }) {
            return Err(DomainError::invariant(format!(
                "lot {} must be reserved before it can be sold",
                self.id
            )));
        }
        self.state = LotState::Sold {
            external_order_id: external_order_id.clone(),
        };
        if let Some(audit) = audit {
            self.audit = Some(audit);
        }
        self.updated_at = at;
        Ok(())
    }

    /// Sold -> Available (returns, corrections), clearing audit metadata.
    pub fn return_to_available(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.state, LotState::Sold { .. }) {
            return Err(DomainError::invariant(format!("lot {} is not sold", self.id)));
        }
        self.state = LotState::Available;
        self.audit = None;
        self.updated_at = at;
        Ok(())
    }

    /// Reserved(a) -> Reserved(b) without passing through Available.
    pub fn retag_reservation(&mut self, to: &OrderId, at: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.state, LotState::Reserved { .. }) {
            return Err(DomainError::invariant(format!("lot {} is not reserved", self.id)));
        }
        self.state = LotState::Reserved { order_id: to.clone() };
        self.updated_at = at;
        Ok(())
    }

    /// Patch the display order number of a sold lot. Returns whether anything changed.
    pub fn set_order_number(&mut self, number: &str) -> DomainResult<bool> {
        if !matches!(self.state, LotState::Sold { .. }) {
            return Err(DomainError::invariant(format!("lot {} is not sold", self.id)));
        }
        let audit = self.audit.get_or_insert_with(LotAudit::default);
        if audit.order_number.as_deref() == Some(number) {
            return Ok(false);
        }
        audit.order_number = Some(number.to_string());
        Ok(true)
    }
}

impl AggregateRoot for WarehouseLot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
