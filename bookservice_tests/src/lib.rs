//! End to end tests run against a deployed catalog service.
//! Enabled with `--features system_tests`, the target is read from `BOOKSERVICE_CATALOG_URL`.
