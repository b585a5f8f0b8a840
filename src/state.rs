//! The application state container.
//!
//! Live-update handlers feed documents in through the `on_*` callbacks;
//! everything the screens ask for is computed from that state by the pure
//! functions of the other modules.

use crate::aggregate::{
    aggregate_year_with, grand_total, owner_rows, property_history, AnnualAggregate, HistoryPoint,
    PropertyRow,
};
use crate::config::RentRollConfig;
use crate::contract::{AdjustmentDue, ContractBook, OwnerMissingContracts};
use crate::error::Result;
use crate::messages::{thread, Message};
use crate::months::{month_options, MonthId, MonthOption};
use crate::period::{KeySchema, PeriodRecord};
use crate::structure::{OwnerStructure, StructureEdit};
use crate::uf::UfQuote;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    Month,
    Year,
}

#[derive(Debug, Clone)]
pub struct RentRollState {
    config: RentRollConfig,
    schema: KeySchema,
    structure: OwnerStructure,
    contracts: ContractBook,
    periods: BTreeMap<MonthId, PeriodRecord>,
    messages: Vec<Message>,
    uf: Option<UfQuote>,
    anchor: MonthId,
    selected: MonthId,
    view: ViewMode,
}

impl RentRollState {
    /// A state anchored at the current month.
    pub fn new(config: RentRollConfig) -> Self {
        Self::with_anchor(config, MonthId::current())
    }

    /// A state whose session anchor is `anchor`. The anchor never moves
    /// afterwards; only the selection does.
    pub fn with_anchor(config: RentRollConfig, anchor: MonthId) -> Self {
        Self {
            schema: KeySchema::from(&config),
            config,
            structure: OwnerStructure::default(),
            contracts: ContractBook::new(),
            periods: BTreeMap::new(),
            messages: Vec::new(),
            uf: None,
            anchor,
            selected: anchor,
            view: ViewMode::Month,
        }
    }

    pub fn config(&self) -> &RentRollConfig {
        &self.config
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn structure(&self) -> &OwnerStructure {
        &self.structure
    }

    pub fn contracts(&self) -> &ContractBook {
        &self.contracts
    }

    pub fn uf(&self) -> Option<&UfQuote> {
        self.uf.as_ref()
    }

    pub fn anchor(&self) -> MonthId {
        self.anchor
    }

    pub fn selected_month(&self) -> MonthId {
        self.selected
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    // Subscription callbacks

    pub fn on_structure(&mut self, document: &Value) {
        self.structure = OwnerStructure::from_document(document);
        info!("Structure refreshed: {} owners", self.structure.owners.len());
    }

    /// Replaces the record of `month`. A `null` document means the month
    /// has no data (any cached record is dropped).
    pub fn on_period(&mut self, month: MonthId, document: &Value) -> Result<()> {
        if document.is_null() {
            self.periods.remove(&month);
            debug!("Period {} cleared", month);
            return Ok(());
        }
        let record = PeriodRecord::from_document(month, document)?;
        debug!("Period {} refreshed: {} owners", month, record.owners.len());
        self.periods.insert(month, record);
        Ok(())
    }

    pub fn on_contracts<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        self.contracts = ContractBook::from_documents(documents);
        info!("Contracts refreshed: {}", self.contracts.len());
    }

    pub fn on_messages(&mut self, messages: Vec<Message>) {
        self.messages = thread(messages);
    }

    pub fn on_uf(&mut self, quote: UfQuote) {
        self.uf = Some(quote);
    }

    // Navigation

    pub fn month_options(&self) -> Vec<MonthOption> {
        month_options(self.anchor, self.config.months_past, self.config.months_future)
    }

    /// Selects a month and switches to the monthly view.
    pub fn select_month(&mut self, month: MonthId) {
        self.selected = month;
        self.view = ViewMode::Month;
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.view = view;
    }

    pub fn previous_month(&self) -> MonthId {
        self.selected.previous()
    }

    // Queries

    pub fn period(&self, month: MonthId) -> Cow<'_, PeriodRecord> {
        match self.periods.get(&month) {
            Some(record) => Cow::Borrowed(record),
            None => Cow::Owned(PeriodRecord::new(month)),
        }
    }

    pub fn current_period(&self) -> Cow<'_, PeriodRecord> {
        self.period(self.selected)
    }

    pub fn previous_period(&self) -> Cow<'_, PeriodRecord> {
        self.period(self.previous_month())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Totals of the selected month's year.
    pub fn annual(&self) -> AnnualAggregate {
        let records: Vec<PeriodRecord> = self.periods.values().cloned().collect();
        aggregate_year_with(&records, self.selected.year(), &self.schema)
    }

    /// The headline total: the selected month, or its whole year in the
    /// yearly view.
    pub fn total_kpi(&self) -> f64 {
        match self.view {
            ViewMode::Month => grand_total(&self.structure, &*self.current_period()),
            ViewMode::Year => grand_total(&self.structure, &self.annual()),
        }
    }

    pub fn owner_rows(&self, owner: &str) -> Vec<PropertyRow> {
        let Some(owner) = self.structure.find_owner(owner) else {
            return Vec::new();
        };
        owner_rows(
            owner,
            &self.current_period(),
            &self.previous_period(),
            &self.schema,
        )
    }

    /// The configured number of months of one property, ending at the
    /// selected month.
    pub fn property_history(&self, owner: &str, property: &str) -> Vec<HistoryPoint> {
        let records: Vec<PeriodRecord> = self.periods.values().cloned().collect();
        property_history(
            &records,
            owner,
            property,
            self.selected,
            self.config.history_months,
        )
    }

    pub fn missing_contracts(&self) -> Vec<OwnerMissingContracts> {
        self.contracts.missing_contracts(&self.structure)
    }

    /// Contracts readjusted in the selected month.
    pub fn adjustments_due(&self) -> Vec<AdjustmentDue> {
        self.contracts
            .adjustments_for_month(&self.structure, self.selected.month())
    }

    /// Applies a structure edit locally and returns the document to write
    /// back. Period keys and contract ids are left as they are.
    pub fn apply_edit(&mut self, edit: &StructureEdit) -> Result<Value> {
        self.structure = self.structure.apply(edit)?;
        Ok(self.structure.to_document())
    }
}
