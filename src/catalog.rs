//! Ticket catalog and account registry.
//!
//! Both are loaded once per run by an external [`CatalogSource`] and are
//! read-only afterwards: schedules hold ticket ids, never tickets.

use std::collections::BTreeMap;

use rand::Rng;

use crate::error::{Result, SchedError};

/// Ticket identifier.
pub type TicketId = u32;

/// Target identifier (catalog key, also the ephemeris lookup key).
pub type TargetId = String;

/// Time-sharing account identifier.
pub type AccountId = String;

/// A celestial target referenced by tickets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Target {
    /// Catalog key.
    pub id: TargetId,
    /// Human-readable name used in plan output.
    pub name: String,
}

impl Target {
    /// Creates a target.
    pub fn new(id: impl Into<TargetId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A schedulable observation request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ticket {
    /// Ticket identifier.
    pub id: TicketId,
    /// Target observed by this ticket (weak reference into the catalog).
    pub target: TargetId,
    /// Owning account.
    pub account: AccountId,
    /// Maximum number of realized observations.
    pub quota: u32,
    /// Observations already realized before this run.
    #[cfg_attr(feature = "serde", serde(default))]
    pub completed: u32,
}

impl Ticket {
    /// Creates a ticket with no completed observations.
    pub fn new(
        id: TicketId,
        target: impl Into<TargetId>,
        account: impl Into<AccountId>,
        quota: u32,
    ) -> Self {
        Self {
            id,
            target: target.into(),
            account: account.into(),
            quota,
            completed: 0,
        }
    }

    /// Sets the number of already-realized observations.
    pub fn with_completed(mut self, completed: u32) -> Self {
        self.completed = completed;
        self
    }

    /// Observations still allowed by the quota.
    pub fn remaining_quota(&self) -> u32 {
        self.quota.saturating_sub(self.completed)
    }
}

/// Read-only collection of tickets and their targets.
///
/// Iteration order is by ticket id, so random draws are reproducible
/// for a fixed seed.
#[derive(Debug, Clone, Default)]
pub struct TicketCatalog {
    tickets: BTreeMap<TicketId, Ticket>,
    targets: BTreeMap<TargetId, Target>,
    ids: Vec<TicketId>,
}

impl TicketCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target (replacing any target with the same id).
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.insert(target.id.clone(), target);
        self
    }

    /// Adds a ticket (replacing any ticket with the same id).
    pub fn with_ticket(mut self, ticket: Ticket) -> Self {
        self.insert_ticket(ticket);
        self
    }

    fn insert_ticket(&mut self, ticket: Ticket) {
        if self.tickets.insert(ticket.id, ticket).is_none() {
            self.ids = self.tickets.keys().copied().collect();
        }
    }

    /// Builds a catalog from targets and tickets.
    pub fn from_parts(
        targets: impl IntoIterator<Item = Target>,
        tickets: impl IntoIterator<Item = Ticket>,
    ) -> Self {
        let targets = targets.into_iter().map(|t| (t.id.clone(), t)).collect();
        let tickets: BTreeMap<_, _> = tickets.into_iter().map(|t| (t.id, t)).collect();
        let ids = tickets.keys().copied().collect();
        Self {
            tickets,
            targets,
            ids,
        }
    }

    /// Number of tickets.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Returns `true` if the catalog holds no tickets.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Looks up a ticket.
    pub fn ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&id)
    }

    /// Looks up a target.
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    /// Target of a ticket, or a catalog error if either is missing.
    pub fn target_of(&self, ticket: TicketId) -> Result<&TargetId> {
        self.tickets
            .get(&ticket)
            .map(|t| &t.target)
            .ok_or_else(|| SchedError::Catalog(format!("unknown ticket {ticket}")))
    }

    /// Iterates over tickets in id order.
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    /// Draws a ticket uniformly at random. `None` if the catalog is empty.
    pub fn random_ticket<R: Rng>(&self, rng: &mut R) -> Option<&Ticket> {
        if self.ids.is_empty() {
            return None;
        }
        let id = self.ids[rng.random_range(0..self.ids.len())];
        self.tickets.get(&id)
    }

    /// Checks that every ticket references a known target.
    pub fn validate(&self) -> Result<()> {
        for ticket in self.tickets.values() {
            if !self.targets.contains_key(&ticket.target) {
                return Err(SchedError::Catalog(format!(
                    "ticket {} references unknown target {}",
                    ticket.id, ticket.target
                )));
            }
        }
        Ok(())
    }
}

/// A time-sharing account.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Share of telescope time (any positive scale; normalized by the registry).
    pub share: f64,
}

impl Account {
    /// Creates an account.
    pub fn new(id: impl Into<AccountId>, share: f64) -> Self {
        Self {
            id: id.into(),
            share,
        }
    }
}

/// Read-only registry of accounts and their configured shares.
///
/// The share sum is computed once at construction and stays fixed for the
/// lifetime of the registry (one scheduling run).
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    accounts: BTreeMap<AccountId, Account>,
    share_sum: f64,
}

impl AccountRegistry {
    /// Builds a registry.
    ///
    /// # Errors
    /// [`SchedError::Catalog`] if any share is negative or non-finite, or the
    /// shares do not sum to a positive value.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Result<Self> {
        let accounts: BTreeMap<_, _> = accounts.into_iter().map(|a| (a.id.clone(), a)).collect();
        if let Some(bad) = accounts
            .values()
            .find(|a| !a.share.is_finite() || a.share < 0.0)
        {
            return Err(SchedError::Catalog(format!(
                "account {} has invalid share {}",
                bad.id, bad.share
            )));
        }
        let share_sum: f64 = accounts.values().map(|a| a.share).sum();
        if share_sum <= 0.0 {
            return Err(SchedError::Catalog(
                "account shares must sum to a positive value".into(),
            ));
        }
        Ok(Self {
            accounts,
            share_sum,
        })
    }

    /// Sum of raw shares.
    pub fn share_sum(&self) -> f64 {
        self.share_sum
    }

    /// Normalized share of an account in `[0, 1]`; `0` for unknown accounts.
    pub fn configured_share(&self, id: &str) -> f64 {
        self.accounts
            .get(id)
            .map_or(0.0, |a| a.share / self.share_sum)
    }

    /// Returns `true` if the account is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.accounts.contains_key(id)
    }

    /// Iterates over accounts in id order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no account is registered.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// External loader for the run's catalog and accounts.
pub trait CatalogSource {
    /// Loads tickets and targets.
    fn load_catalog(&self) -> Result<TicketCatalog>;

    /// Loads accounts and shares.
    fn load_accounts(&self) -> Result<AccountRegistry>;
}

/// A [`CatalogSource`] backed by values already in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    catalog: TicketCatalog,
    accounts: AccountRegistry,
}

impl InMemorySource {
    /// Wraps an existing catalog and registry.
    pub fn new(catalog: TicketCatalog, accounts: AccountRegistry) -> Self {
        Self { catalog, accounts }
    }
}

impl CatalogSource for InMemorySource {
    fn load_catalog(&self) -> Result<TicketCatalog> {
        Ok(self.catalog.clone())
    }

    fn load_accounts(&self) -> Result<AccountRegistry> {
        Ok(self.accounts.clone())
    }
}
