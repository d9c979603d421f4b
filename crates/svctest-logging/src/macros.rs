//! ---
//! svctest_section: "03-logging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Context-enriched logging macros."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __svc_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            object_path = ctx.object_path.unwrap_or(""),
            interface = ctx.interface.unwrap_or(""),
            member = ctx.member.unwrap_or(""),
            check = ctx.check.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with call context.
#[macro_export]
macro_rules! svc_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with call context.
#[macro_export]
macro_rules! svc_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with call context.
#[macro_export]
macro_rules! svc_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with call context.
#[macro_export]
macro_rules! svc_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__svc_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
