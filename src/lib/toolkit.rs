//! Bridge to the alignment-format toolkit.
//!
//! The sorter works on SAM text: one header line or one record per line. The
//! [`AlignmentToolkit`] trait turns a container file into such a stream
//! ([`AlignmentToolkit::decode`]), turns a stream back into a container file
//! ([`AlignmentToolkit::encode`]), and joins finished block files in order
//! ([`AlignmentToolkit::concatenate`]).
//!
//! [`Samtools`] and [`Sambamba`] drive an external binary through pipes.
//! [`PlainText`] reads and writes SAM text files directly and needs no
//! subprocess.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use log::debug;

use crate::config::{DEFAULT_COMPRESSION_LEVEL, SortConfig};
use crate::errors::{Result, SortError};
use crate::sort::record::is_header_line;

const PIPE_BUFFER_SIZE: usize = 256 * 1024;

/// Decoding, encoding and concatenation of alignment files.
pub trait AlignmentToolkit: Send + Sync {
    /// Short name used in log and error messages.
    fn name(&self) -> &str;

    /// File extension (without dot) of files written by [`Self::encode`].
    fn extension(&self) -> &str;

    /// Open `input` as a header-then-records text stream.
    fn decode(&self, input: &Path) -> Result<RecordSource>;

    /// Create `output`; text written to the sink is encoded into it.
    fn encode(&self, output: &Path) -> Result<RecordSink>;

    /// Join `inputs`, each a complete file with its own header, into `output`.
    ///
    /// The result keeps one header and every record in input order.
    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// A child process plus the thread collecting its standard error.
struct ToolProcess {
    tool: String,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl ToolProcess {
    fn spawn(tool: String, mut command: Command) -> Result<Self> {
        debug!("Running {tool}");
        let mut child = command
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SortError::ToolInvocation { tool: tool.clone(), source })?;
        let stderr = child.stderr.take().map(drain_stderr);
        Ok(Self { tool, child, stderr, finished: false })
    }

    fn wait(mut self) -> Result<()> {
        let status = self.child.wait()?;
        self.finished = true;
        let stderr = self.stderr.take().and_then(|h| h.join().ok()).unwrap_or_default();
        check_status(&self.tool, status, stderr)
    }
}

impl Drop for ToolProcess {
    fn drop(&mut self) {
        if !self.finished {
            // An abandoned stream must not leave the child running.
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    })
}

fn check_status(tool: &str, status: ExitStatus, stderr: String) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(SortError::ToolFailed {
            tool: tool.to_string(),
            status,
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Decoded text stream. Call [`RecordSource::finish`] after reading to the end.
pub struct RecordSource {
    reader: Box<dyn BufRead + Send>,
    process: Option<ToolProcess>,
}

impl RecordSource {
    /// Stream backed by any buffered reader, with no child process.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self { reader: Box::new(reader), process: None }
    }

    /// Wait for the decoder to exit and check its status.
    pub fn finish(self) -> Result<()> {
        let Self { reader, process } = self;
        drop(reader);
        match process {
            Some(process) => process.wait(),
            None => Ok(()),
        }
    }
}

impl Read for RecordSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for RecordSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
    }
}

/// Text sink feeding an encoder. Call [`RecordSink::finish`] when done writing.
pub struct RecordSink {
    writer: Box<dyn Write + Send>,
    process: Option<ToolProcess>,
}

impl RecordSink {
    /// Sink backed by any writer, with no child process.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self { writer: Box::new(writer), process: None }
    }

    /// Flush, close the encoder's input, and wait for it to exit.
    pub fn finish(self) -> Result<()> {
        let Self { mut writer, process } = self;
        writer.flush()?;
        drop(writer);
        match process {
            Some(process) => process.wait(),
            None => Ok(()),
        }
    }
}

impl Write for RecordSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// `samtools` driven through pipes.
#[derive(Debug, Clone)]
pub struct Samtools {
    binary: PathBuf,
    threads: usize,
    compression_level: u32,
}

impl Samtools {
    /// `samtools` from `PATH`, single-threaded, default compression.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("samtools"),
            threads: 1,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// `samtools` from `PATH` with the thread count and compression level of
    /// `config`.
    #[must_use]
    pub fn from_config(config: &SortConfig) -> Self {
        Self::new().threads(config.threads).compression_level(config.compression_level)
    }

    /// Use a specific `samtools` executable.
    #[must_use]
    pub fn binary(mut self, binary: PathBuf) -> Self {
        self.binary = binary;
        self
    }

    /// Threads handed to each `samtools` invocation.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Compression level for encoded output.
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg(subcommand);
        command
    }

    fn describe(&self, subcommand: &str, path: &Path) -> String {
        format!("{} {subcommand} {}", self.binary.display(), path.display())
    }

    fn encode_command(&self, output: &Path) -> Command {
        let mut command = self.command("view");
        command
            .arg("-b")
            .arg("--threads")
            .arg(self.threads.to_string())
            .arg("-l")
            .arg(self.compression_level.to_string())
            .arg("-o")
            .arg(output)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null());
        command
    }
}

impl Default for Samtools {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentToolkit for Samtools {
    fn name(&self) -> &str {
        "samtools"
    }

    fn extension(&self) -> &str {
        "bam"
    }

    fn decode(&self, input: &Path) -> Result<RecordSource> {
        let mut command = self.command("view");
        command
            .arg("-h")
            .arg("--threads")
            .arg(self.threads.to_string())
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        spawn_decoder(self.describe("view", input), command)
    }

    fn encode(&self, output: &Path) -> Result<RecordSink> {
        spawn_encoder(self.describe("view -b -o", output), self.encode_command(output))
    }

    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let tool = self.describe("cat -o", output);
        debug!("Running {tool} on {} inputs", inputs.len());
        let result = self
            .command("cat")
            .arg("-o")
            .arg(output)
            .args(inputs)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SortError::ToolInvocation { tool: tool.clone(), source })?;
        if result.status.success() {
            Ok(())
        } else {
            Err(SortError::ConcatenationFailure {
                tool,
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }
}

/// Start a decoder whose standard output is the text stream.
fn spawn_decoder(tool: String, command: Command) -> Result<RecordSource> {
    let mut process = ToolProcess::spawn(tool, command)?;
    let stdout = process.child.stdout.take().ok_or_else(|| {
        io::Error::new(io::ErrorKind::BrokenPipe, "decoder stdout was not captured")
    })?;
    Ok(RecordSource {
        reader: Box::new(BufReader::with_capacity(PIPE_BUFFER_SIZE, stdout)),
        process: Some(process),
    })
}

/// Start an encoder reading the text stream from its standard input.
fn spawn_encoder(tool: String, command: Command) -> Result<RecordSink> {
    let mut process = ToolProcess::spawn(tool, command)?;
    let stdin = process.child.stdin.take().ok_or_else(|| {
        io::Error::new(io::ErrorKind::BrokenPipe, "encoder stdin was not captured")
    })?;
    Ok(RecordSink {
        writer: Box::new(BufWriter::with_capacity(PIPE_BUFFER_SIZE, stdin)),
        process: Some(process),
    })
}

/// Copy `source`'s lines to `sink`, dropping header lines unless `keep_header`.
fn copy_records<R: BufRead, W: Write>(
    source: &mut R,
    sink: &mut W,
    keep_header: bool,
) -> Result<()> {
    let mut line = Vec::with_capacity(1024);
    loop {
        line.clear();
        if source.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        if !keep_header && is_header_line(&line) {
            continue;
        }
        sink.write_all(&line)?;
        if line.last() != Some(&b'\n') {
            sink.write_all(b"\n")?;
        }
    }
}

/// `sambamba` driven through pipes.
///
/// `sambamba` has no `cat`, so [`AlignmentToolkit::concatenate`] decodes the
/// blocks in order and re-encodes them into one file. A failed step there is
/// reported as [`SortError::ConcatenationFailure`].
#[derive(Debug, Clone)]
pub struct Sambamba {
    binary: PathBuf,
    threads: usize,
    compression_level: u32,
    sam_input: bool,
}

impl Sambamba {
    /// `sambamba` from `PATH`, single-threaded, default compression, BAM input.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("sambamba"),
            threads: 1,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sam_input: false,
        }
    }

    /// `sambamba` from `PATH` with the thread count and compression level of
    /// `config`.
    #[must_use]
    pub fn from_config(config: &SortConfig) -> Self {
        Self::new().threads(config.threads).compression_level(config.compression_level)
    }

    /// Use a specific `sambamba` executable.
    #[must_use]
    pub fn binary(mut self, binary: PathBuf) -> Self {
        self.binary = binary;
        self
    }

    /// Threads handed to each `sambamba` invocation.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Compression level for encoded output.
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Treat the input file as SAM text. `sambamba` does not detect it.
    #[must_use]
    pub fn sam_input(mut self, sam_input: bool) -> Self {
        self.sam_input = sam_input;
        self
    }

    fn view_command(&self, input: &Path, sam_input: bool) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("view").arg("-h");
        if sam_input {
            command.arg("-S");
        }
        command
            .arg("--nthreads")
            .arg(self.threads.to_string())
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        command
    }

    fn encode_command(&self, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("view")
            .arg("--nthreads")
            .arg(self.threads.to_string())
            .arg("-f")
            .arg("bam")
            .arg("-l")
            .arg(self.compression_level.to_string())
            .arg("-S")
            .arg("-o")
            .arg(output)
            .arg("/dev/stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null());
        command
    }

    fn describe(&self, subcommand: &str, path: &Path) -> String {
        format!("{} {subcommand} {}", self.binary.display(), path.display())
    }

    fn join_blocks(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut sink = self.encode(output)?;
        for (i, input) in inputs.iter().enumerate() {
            // Blocks are BAM written by `encode`, whatever the input format.
            let command = self.view_command(input, false);
            let mut source = spawn_decoder(self.describe("view", input), command)?;
            copy_records(&mut source, &mut sink, i == 0)?;
            source.finish()?;
        }
        sink.finish()
    }
}

impl Default for Sambamba {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentToolkit for Sambamba {
    fn name(&self) -> &str {
        "sambamba"
    }

    fn extension(&self) -> &str {
        "bam"
    }

    fn decode(&self, input: &Path) -> Result<RecordSource> {
        let command = self.view_command(input, self.sam_input);
        spawn_decoder(self.describe("view", input), command)
    }

    fn encode(&self, output: &Path) -> Result<RecordSink> {
        spawn_encoder(self.describe("view -f bam -o", output), self.encode_command(output))
    }

    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        debug!("Joining {} blocks into {} with {}", inputs.len(), output.display(), self.name());
        self.join_blocks(inputs, output).map_err(|error| match error {
            SortError::ToolFailed { tool, status, stderr } => {
                SortError::ConcatenationFailure { tool, status, stderr }
            }
            other => other,
        })
    }
}

/// SAM text files read and written in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl AlignmentToolkit for PlainText {
    fn name(&self) -> &str {
        "text"
    }

    fn extension(&self) -> &str {
        "sam"
    }

    fn decode(&self, input: &Path) -> Result<RecordSource> {
        let file = File::open(input)?;
        Ok(RecordSource::from_reader(BufReader::with_capacity(PIPE_BUFFER_SIZE, file)))
    }

    fn encode(&self, output: &Path) -> Result<RecordSink> {
        let file = File::create(output)?;
        Ok(RecordSink::from_writer(BufWriter::with_capacity(PIPE_BUFFER_SIZE, file)))
    }

    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut writer = BufWriter::with_capacity(PIPE_BUFFER_SIZE, File::create(output)?);
        for (i, input) in inputs.iter().enumerate() {
            let mut reader = BufReader::with_capacity(PIPE_BUFFER_SIZE, File::open(input)?);
            // Headers repeat in every block; keep only the first block's copy.
            copy_records(&mut reader, &mut writer, i == 0)?;
        }
        writer.flush()?;
        Ok(())
    }
}
