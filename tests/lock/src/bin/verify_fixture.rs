//! Prints the canonical safety report for each reference scenario.
//!
//! Usage: `verify_fixture`
//! Output: one `name={canonical report}` line per scenario.

use lock_tests::fixture::verify_lines;

fn main() {
    lock_tests::init_tracing();
    for line in verify_lines().expect("verification failed") {
        println!("{line}");
    }
}
