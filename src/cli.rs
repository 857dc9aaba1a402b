use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "runtar")]
#[command(version)]
#[command(about = "A read-only USTAR archive inspector with HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  runtar data.tar                     validate data.tar and print its entry count\n  \
  runtar -l data.tar dir/             list the immediate children of dir/\n  \
  runtar -p data.tar notes.txt | more send notes.txt via pipe into more\n  \
  runtar -lv https://example.com/archive.tar   list a remote archive verbosely")]
pub struct Cli {
    /// Tar archive path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entry paths to operate on
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// Test archive integrity (default)
    #[arg(short = 't')]
    pub test: bool,

    /// List entries, or the children of each PATH
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Show the type of each PATH
    #[arg(short = 's')]
    pub stat: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Start reading piped files at this byte offset
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub offset: u64,

    /// Stop after piping this many bytes of each file
    #[arg(long, value_name = "BYTES")]
    pub length: Option<u64>,

    /// Maximum number of children listed per directory
    #[arg(short = 'c', value_name = "N", default_value_t = 1024)]
    pub capacity: usize,

    /// Refuse archives larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Skip the integrity check before lookups
    #[arg(long)]
    pub no_validate: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Whether the run only needs the integrity check.
    pub fn is_test_only(&self) -> bool {
        self.test || !(self.list || self.verbose || self.stat || self.pipe)
    }
}
