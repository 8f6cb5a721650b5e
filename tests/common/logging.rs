use std::{io, sync::Once, thread};

use log::LevelFilter;

static LOGGER_INIT: Once = Once::new();

/// Install a stdout logger for `level` and above, once per test binary. Lines are tagged with the
/// emitting thread, so server and observer output can be told apart in threaded tests.
pub(crate) fn setup_logger(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        let result = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{:?} {:<5} {}: {}",
                    thread::current().id(),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(level)
            // One line per failed generation attempt drowns everything else.
            .level_for("tile_cascade::cascade::generation", level.min(LevelFilter::Info))
            .chain(io::stdout())
            .apply();
        if let Err(error) = result {
            eprintln!("test logger already installed: {}", error);
        }
    })
}
