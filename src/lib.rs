//! # eventcascade: Expression-Driven Security Event Engine
//!
//! `eventcascade` compiles declarative decoder/rule/output/filter assets
//! into composed [`expr::Expression`] trees and evaluates them per-event
//! with short-circuit semantics, dispatching through a priority-ordered
//! route table backed by a bounded event queue.
//!
//! ## Core Concepts
//!
//! - **Expression**: the tagged-enum evaluation tree (`Term`, `And`, `Or`,
//!   `Chain`, `Broadcast`, `Implication`)
//! - **Helpers**: the ~60-entry builder library leaf terms are compiled from
//! - **Asset / Policy**: one asset compiles to a check+stage expression;
//!   a policy composes a family of assets into one root expression
//! - **Queue / Router**: the bounded MPMC event queue and the worker pool
//!   that dispatches queued events against the route table
//!
//! ## Quick Start
//!
//! ```
//! use eventcascade::event::Event;
//! use eventcascade::expr::{EvalResult, Expression};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let check = Expression::term(
//!     "hasType",
//!     Arc::new(|event: Event| {
//!         use eventcascade::event::Document;
//!         if event.exists("/type") {
//!             EvalResult::success(event, "type present")
//!         } else {
//!             EvalResult::failure(event, "type missing")
//!         }
//!     }),
//! );
//! let result = check.eval(Event::new(json!({"type": "syslog"})));
//! assert!(result.ok);
//! ```
//!
//! ## Module Guide
//!
//! - [`expr`] - the expression algebra and evaluation semantics
//! - [`event`] - the mutable JSON event document (`Document` trait)
//! - [`param`] - helper argument parsing (literal vs. `$`-reference)
//! - [`registry`] - the name -> helper builder map
//! - [`helpers`] - the builtin helper library
//! - [`asset`] - the asset compiler
//! - [`policy`] - the policy composer
//! - [`queue`] - the bounded MPMC event queue with flood-spill
//! - [`route`] - the route table
//! - [`router`] - the worker pool dispatching events against routes
//! - [`collaborators`] - the store/KVDB/wdb external interfaces
//! - [`config`] - the configuration surface (file + CLI)
//! - [`telemetry`] - trace and error rendering for sinks

pub mod asset;
pub mod collaborators;
pub mod config;
pub mod event;
pub mod expr;
pub mod helpers;
pub mod param;
pub mod policy;
pub mod queue;
pub mod registry;
pub mod route;
pub mod router;
pub mod telemetry;
