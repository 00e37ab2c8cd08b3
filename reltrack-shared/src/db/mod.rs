/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: Embedded schema migrations
///
/// Entity queries live next to their models in the `models` module.

pub mod migrations;
pub mod pool;
