mod decode;
mod resize;

use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent};
use crossterm::terminal;

use termvid_core::encode::encode_update;
use termvid_core::frame::Frame;
use termvid_core::timing::RollingAverage;

/// Samples kept per timing window; old enough frames stop influencing
/// the stats line.
const WINDOW_SIZE: usize = 2500;

const MIN_COLS: u16 = 10;
const MIN_ROWS: u16 = 5;

#[derive(Parser)]
#[command(name = "termvid-play", about = "Play videos directly in the terminal")]
struct Cli {
    /// Video file or stream URL, handed to ffmpeg as-is.
    input: String,

    /// Restart from the beginning when the video ends.
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Playback rate. 0 follows the source rate, negative renders
    /// frames as fast as they decode.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    fps: f64,

    /// Show per-frame timing averages on a reserved bottom row.
    #[arg(long)]
    stats: bool,

    /// Ask the terminal emulator to resize itself before playback.
    #[arg(long, num_args = 2, value_names = ["ROWS", "COLS"])]
    size: Option<Vec<u16>>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(size) = &cli.size {
        let (rows, cols) = (size[0], size[1]);
        if rows < MIN_ROWS || cols < MIN_COLS {
            anyhow::bail!(
                "--size must be at least {MIN_ROWS} rows and {MIN_COLS} columns, got {rows} rows by {cols} columns"
            );
        }
        request_terminal_resize(rows, cols)?;
    }

    let decoder = decode::VideoDecoder::open(&cli.input)?;

    let frame_interval = if cli.fps < 0.0 {
        None
    } else {
        let fps = if cli.fps > 0.0 {
            cli.fps
        } else {
            match decoder.native_fps() {
                Some(f) if f >= 1.0 => f,
                _ => {
                    eprintln!("Warning: source frame rate unknown, defaulting to 30 fps");
                    30.0
                }
            }
        };
        Some(Duration::from_secs_f64(1.0 / fps))
    };

    let (cols, rows) = terminal::size()?;
    let usable_rows = rows.saturating_sub(u16::from(cli.stats));
    if cols < MIN_COLS || usable_rows < MIN_ROWS {
        anyhow::bail!(
            "terminal is {cols}x{rows}, need at least {MIN_COLS} columns and {MIN_ROWS} usable rows"
        );
    }

    // Restore the terminal even when the render loop panics.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        original_hook(info);
    }));

    terminal::enable_raw_mode()?;
    let stdout = std::io::stdout();
    let mut stdout = BufWriter::with_capacity(256 * 1024, stdout.lock());
    stdout.write_all(b"\x1b[?1049h")?; // enter alternate screen
    stdout.write_all(b"\x1b[?25l")?; // hide cursor
    stdout.flush()?;

    let result = run_playback(
        &mut stdout,
        &cli.input,
        decoder,
        cli.loop_playback,
        cli.stats,
        frame_interval,
    );

    stdout.write_all(b"\x1b[0m")?; // reset colors
    stdout.write_all(b"\x1b[?25h")?; // show cursor
    stdout.write_all(b"\x1b[?1049l")?; // leave alternate screen
    stdout.flush()?;
    terminal::disable_raw_mode()?;

    result
}

fn run_playback(
    out: &mut impl Write,
    input: &str,
    first_decoder: decode::VideoDecoder,
    loop_playback: bool,
    show_stats: bool,
    frame_interval: Option<Duration>,
) -> anyhow::Result<()> {
    let stats_reserve = u16::from(show_stats);
    let (mut cols, mut rows) = terminal::size()?;
    let mut usable_rows = rows.saturating_sub(stats_reserve);

    let mut resizer = resize::FrameResizer::new(cols, usable_rows);
    let mut previous: Option<Frame> = None;
    let mut encode_buf = Vec::with_capacity(256 * 1024);

    let mut decode_avg = RollingAverage::new(WINDOW_SIZE);
    let mut encode_avg = RollingAverage::new(WINDOW_SIZE);
    let mut write_avg = RollingAverage::new(WINDOW_SIZE);
    let mut bytes_avg = RollingAverage::new(WINDOW_SIZE);

    out.write_all(b"\x1b[2J")?;
    out.flush()?;

    // The ffmpeg pipe cannot rewind, so every pass after the first
    // opens a fresh decoder for the same input.
    let mut decoder = Some(first_decoder);
    loop {
        let mut dec = match decoder.take() {
            Some(d) => d,
            None => decode::VideoDecoder::open(input)?,
        };

        let mut deadline = Instant::now();
        loop {
            if poll_quit()? {
                return Ok(());
            }

            let (now_cols, now_rows) = terminal::size()?;
            if (now_cols, now_rows) != (cols, rows) {
                cols = now_cols;
                rows = now_rows;
                usable_rows = rows.saturating_sub(stats_reserve);
                if cols < MIN_COLS || usable_rows < MIN_ROWS {
                    anyhow::bail!(
                        "terminal shrank to {cols}x{rows}, need at least {MIN_COLS} columns and {MIN_ROWS} usable rows"
                    );
                }
                resizer.set_target(cols, usable_rows);
                // The next diff sees a dimension mismatch and repaints
                // everything; only the leftover border needs clearing.
                out.write_all(b"\x1b[2J")?;
            }

            let decode_start = Instant::now();
            let Some(raw) = dec.next() else { break };
            let resized = resizer.resize(&raw.data, raw.width, raw.height)?;
            let decoded = Instant::now();

            let current = Frame::from_rgb(&resized, cols, usable_rows);
            let mut changes = match &previous {
                Some(prev) => current.diff_against(prev),
                None => current.cells().to_vec(),
            };
            encode_update(&mut changes, usable_rows, &mut encode_buf);
            let encoded = Instant::now();

            if !encode_buf.is_empty() {
                out.write_all(&encode_buf)?;
                out.flush()?;
            }
            let written = Instant::now();

            previous = Some(current);

            decode_avg.record(micros(decode_start, decoded));
            encode_avg.record(micros(decoded, encoded));
            write_avg.record(micros(encoded, written));
            bytes_avg.record(encode_buf.len() as u64);

            if show_stats {
                print_stats(out, usable_rows, &decode_avg, &encode_avg, &write_avg, &bytes_avg)?;
            }

            if let Some(interval) = frame_interval {
                deadline += interval;
                if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                    std::thread::sleep(wait);
                }
            }
        }

        if !loop_playback {
            return Ok(());
        }
    }
}

fn micros(from: Instant, to: Instant) -> u64 {
    (to - from).as_micros() as u64
}

/// Drain pending input, reporting whether a quit key was pressed.
fn poll_quit() -> anyhow::Result<bool> {
    while event::poll(Duration::ZERO)? {
        if let Event::Key(KeyEvent { code, .. }) = event::read()? {
            if matches!(code, KeyCode::Char('q') | KeyCode::Esc) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn print_stats(
    out: &mut impl Write,
    video_rows: u16,
    decode_avg: &RollingAverage,
    encode_avg: &RollingAverage,
    write_avg: &RollingAverage,
    bytes_avg: &RollingAverage,
) -> anyhow::Result<()> {
    let decode = decode_avg.mean();
    let encode = encode_avg.mean();
    let write = write_avg.mean();
    let total = decode + encode + write;
    let pct = 100.0 / total as f64;
    write!(
        out,
        "\x1b[{};1H\x1b[0m decode {}\u{b5}s ({:.1}%) | diff+encode {}\u{b5}s ({:.1}%) | write {}\u{b5}s ({:.1}%) | total {}\u{b5}s | {:.1} KiB/frame\x1b[K",
        video_rows + 1,
        decode,
        decode as f64 * pct,
        encode,
        encode as f64 * pct,
        write,
        write as f64 * pct,
        total,
        bytes_avg.mean() as f64 / 1024.0,
    )?;
    out.flush()?;
    Ok(())
}

/// CSI 8 asks the emulator to resize its window; emulators are free to
/// ignore it, so the real grid size is re-read afterwards.
fn request_terminal_resize(rows: u16, cols: u16) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "\x1b[8;{rows};{cols}t")?;
    stdout.flush()?;
    Ok(())
}

fn cleanup_terminal() {
    let _ = std::io::stdout().write_all(b"\x1b[0m\x1b[?25h\x1b[?1049l");
    let _ = std::io::stdout().flush();
    let _ = terminal::disable_raw_mode();
}
