pub mod errors;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod startup;
pub mod state;

pub use startup::run;
