//! UI bridge for the Agenda core.
//!
//! Only `api` is exposed to the bridge codegen; everything else stays in
//! `agenda_core`.

pub mod api;
