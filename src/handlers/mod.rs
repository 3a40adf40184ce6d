//! HTTP surface (spec §6): one streaming endpoint (`generate_sql`) plus
//! three ordinary JSON endpoints and the health/readiness probes.

pub mod execute_query;
pub mod explain_sql;
pub mod feedback;
pub mod generate_sql;
pub mod health;
