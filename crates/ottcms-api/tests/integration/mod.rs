//! Tests that need Redis, Firestore or S3 reachable from the environment.

mod firestore_tests;
mod redis_tests;
mod storage_tests;
