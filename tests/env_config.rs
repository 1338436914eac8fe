//! Start-up from environment variables. Kept in its own test binary because
//! it mutates the process environment and the global configuration.

use varcell::config::get_config;
use varcell::metrics::get_profiler;

#[test]
fn init_from_env_stores_merged_configuration() {
    // Load the global configuration before the variables exist.
    assert!(!get_config().get().profiling.report_on_shutdown);

    // SAFETY: the only test in this binary, so no other thread reads the
    // environment concurrently.
    unsafe {
        std::env::set_var("VARCELL_PROFILE", "true");
        std::env::set_var("VARCELL_PROFILE_REPORT", "true");
    }

    varcell::init().unwrap();

    let stored = get_config().get();
    assert!(stored.profiling.enabled);
    assert!(stored.profiling.report_on_shutdown);
    assert!(get_config().is_profiling_enabled());
    assert!(get_profiler().is_enabled());

    varcell::shutdown();
}
