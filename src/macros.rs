/// Bracket the rest of the enclosing scope with the installed instruments
#[macro_export]
#[cfg(feature = "enable")]
macro_rules! region {
    () => {
        let _region = $crate::Region::global(module_path!());
    };
    ($name:expr) => {
        let _region = $crate::Region::global($name);
    };
}

/// Bracket a block with the installed instruments and return its value
#[macro_export]
#[cfg(feature = "enable")]
macro_rules! time_region {
    ($name:expr, $work:expr) => {{
        let _region = $crate::Region::global($name);
        let result = $work;
        result
    }};
}

/// Install a set of instruments for the region macros
#[macro_export]
#[cfg(feature = "enable")]
macro_rules! install {
    ($($instrument:expr),* $(,)?) => {{
        let instruments = $crate::Instruments::new()
            $(.with($instrument))*;
        $crate::instrument::install(instruments)
    }};
}

// Disable feature macros

#[macro_export]
#[cfg(not(feature = "enable"))]
macro_rules! region {
    () => {};
    ($name:expr) => {};
}

#[macro_export]
#[cfg(not(feature = "enable"))]
macro_rules! time_region {
    ($name:expr, $work:expr) => {{
        $work
    }};
}

#[macro_export]
#[cfg(not(feature = "enable"))]
macro_rules! install {
    ($($instrument:expr),* $(,)?) => {
        None::<std::sync::Arc<$crate::Instruments>>
    };
}
