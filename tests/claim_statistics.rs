//! Claim statistics through the global profiler. Kept in its own test binary
//! so no other test records into the same profiler.

use varcell::metrics::{CellKind, get_profiler};
use varcell::prelude::*;
use varcell::{RuntimeConfig, config::ProfilingConfig};
use varcell_runtime::testing::CountingRuntime;

type Rt = CountingRuntime;

#[test]
fn profiler_tracks_cell_lifecycles() {
    let config = RuntimeConfig {
        profiling: ProfilingConfig {
            enabled: true,
            report_on_shutdown: true,
        },
        ..Default::default()
    };
    varcell::init_with(&config).unwrap();
    let profiler = get_profiler();
    profiler.reset();

    {
        let mut local = PlainCell::<Rt>::unbound("x");
        local.assign(Rt::allocate());
        local.assign(Rt::allocate());
        assert!(local.read().is_ok());

        let param = ParameterCell::<Rt>::adopt_owned("p", Rt::allocate());
        let kept = param.into_inner();

        let shared = SharedCell::<Rt>::unbound("c");
        let captured = shared.retain();
        assert!(captured.bind().read().is_err());
        captured.release();
        drop(kept);
        drop(shared);
    }

    let plain = profiler.kind_stats(CellKind::Plain);
    assert_eq!(plain.constructed, 1);
    assert_eq!(plain.claims_bound, 2);
    assert_eq!(plain.claims_released, 2);

    let parameter = profiler.kind_stats(CellKind::Parameter);
    assert_eq!(parameter.claims_bound, 1);
    assert_eq!(parameter.claims_released, 1);

    let shared = profiler.kind_stats(CellKind::Shared);
    assert_eq!(shared.unbound_errors, 1);
    assert_eq!(shared.cells_freed, 1);

    assert_eq!(profiler.outstanding_claims(), 0);
    assert_eq!(Rt::live_objects(), 0);
    varcell::shutdown();
}
