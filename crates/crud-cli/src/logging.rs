use std::io::{Stderr, Stdout, Write};

use nu_ansi_term::Color::{Blue, Magenta, Red, Yellow};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    registry::LookupSpan,
};

use crate::{cli::Args, utils::Colored};

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "{} ", Colored(Magenta, "[TRACE]")),
            Level::DEBUG => write!(writer, "{} ", Colored(Blue, "[DEBUG]")),
            Level::INFO => write!(writer, ""),
            Level::WARN => write!(writer, "{} ", Colored(Yellow, "[WARN]")),
            Level::ERROR => write!(writer, "{} ", Colored(Red, "[ERROR]")),
        }?;

        if let Some(message) = visitor.message {
            writeln!(writer, "{message}")
        } else {
            writeln!(writer)
        }
    }
}

struct WriterBuilder;

/// Stdout for regular output, stderr for diagnostics.
enum StdWriter {
    Out(Stdout),
    Err(Stderr),
}

impl Write for StdWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            StdWriter::Out(out) => out.write(buf),
            StdWriter::Err(err) => err.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            StdWriter::Out(out) => out.flush(),
            StdWriter::Err(err) => err.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for WriterBuilder {
    type Writer = StdWriter;

    fn make_writer(&'a self) -> Self::Writer {
        StdWriter::Out(std::io::stdout())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        if meta.level() == &Level::INFO {
            StdWriter::Out(std::io::stdout())
        } else {
            StdWriter::Err(std::io::stderr())
        }
    }
}

fn filter_level(args: &Args) -> Level {
    if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 || args.log_sql {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

pub fn setup_logging(args: &Args) {
    let filter_level = filter_level(args);

    let builder = fmt::Subscriber::builder()
        .with_env_filter(format!("crud={filter_level}"))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(WriterBuilder)
        .compact()
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.event_format(CustomFormatter).finish())
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn level(argv: &[&str]) -> Level {
        filter_level(&Args::parse_from(argv))
    }

    #[test]
    fn test_filter_level() {
        assert_eq!(level(&["crud", "tables"]), Level::INFO);
        assert_eq!(level(&["crud", "-v", "tables"]), Level::DEBUG);
        assert_eq!(level(&["crud", "-vv", "tables"]), Level::TRACE);
        assert_eq!(level(&["crud", "--log-sql", "tables"]), Level::DEBUG);
        assert_eq!(level(&["crud", "-q", "-vv", "tables"]), Level::ERROR);
    }
}
