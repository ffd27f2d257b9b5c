//! Genetic-algorithm observing-time scheduler for an autonomous telescope.
//!
//! Given a catalog of observation tickets, the accounts that own them and
//! an ephemeris, the crate evolves schedules that tile an observing window
//! with observations and scores them on visibility, altitude, account
//! fairness, slew distance and diversity.
//!
//! - [`catalog`]: targets, tickets, accounts and catalog sources
//! - [`ephemeris`]: the visibility/position provider seam
//! - [`context`]: the immutable per-run scheduling context
//! - [`ga`]: schedule chromosome, merits, single-objective GA and NSGA-II
//! - [`plan`]: the final observing plan and its text form
//!
//! # Example
//!
//! ```
//! use u_obsched::catalog::{Account, AccountRegistry, Target, Ticket, TicketCatalog};
//! use u_obsched::context::SchedulingContext;
//! use u_obsched::ephemeris::{SkyPosition, StaticEphemeris};
//! use u_obsched::ga::{GaConfig, GaRunner};
//! use u_obsched::plan::Plan;
//!
//! let catalog = TicketCatalog::new()
//!     .with_target(Target::new("m31", "M31"))
//!     .with_target(Target::new("m42", "M42"))
//!     .with_ticket(Ticket::new(1, "m31", "alice", 2))
//!     .with_ticket(Ticket::new(2, "m42", "bob", 2));
//! let accounts = AccountRegistry::new([
//!     Account::new("alice", 1.0),
//!     Account::new("bob", 1.0),
//! ])?;
//! let ephemeris = StaticEphemeris::new()
//!     .with_target("m31", SkyPosition::new(10.68, 41.27))
//!     .with_target("m42", SkyPosition::new(83.82, -5.39));
//!
//! let jd0 = 2_460_310.5;
//! let ctx = SchedulingContext::new(&catalog, &accounts, &ephemeris, jd0, jd0 + 0.25, 300.0)?;
//! let config = GaConfig::fast().with_seed(1).with_max_generations(5);
//! let result = GaRunner::run(ctx, &config)?;
//! let plan = Plan::from_schedule(&result.best, &ctx)?;
//! assert!(!plan.is_empty());
//! # Ok::<(), u_obsched::error::SchedError>(())
//! ```

pub mod catalog;
pub mod context;
pub mod ephemeris;
pub mod error;
pub mod ga;
pub mod plan;
pub mod random;
pub mod time;
