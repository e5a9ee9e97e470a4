pub mod init_tracer;

pub use init_tracer::{
    init_global_filter_layer, init_otel_layer, init_otel_tracing, init_panic_tracing_hook,
    init_stdout_layer, init_tracing, OtelFilter, OtelFilterLevel,
};
