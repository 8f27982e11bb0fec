//! Session accessor. Tokens are issued elsewhere; this module only reads them.

pub mod dto;
pub mod model;
