// Integration tests entry point
// These tests drive the public service API end to end: a local HTTP
// responder stands in for remote inputs and every test gets its own
// temporary output directory.

mod integration {
    mod async_jobs_test;
    mod retention_test;
    mod sync_requests_test;
    pub mod test_harness;
}
