//! The two load strategies.
//!
//! Both feed the same dimensional schema from the same raw record shapes;
//! row-wise maps and resolves per record on the client, set-wise lands raw
//! files in staging tables and lets the engine transform them.

pub mod row_wise;
pub mod staged;
