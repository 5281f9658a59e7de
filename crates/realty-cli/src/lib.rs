//! Realty Agents CLI library: the command implementations behind the
//! `realty` binary, exposed for integration tests.

pub mod commands;
