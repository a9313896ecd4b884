use std::path::PathBuf;

use apontar_core::Status;

use crate::commands::common::is_identity_field;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "apontar")]
#[command(about = "Record and follow up clinical-trial quality findings in a shared workbook")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Name recorded as the author of changes (defaults to APONTAR_ACTOR)
    #[arg(long, global = true, value_name = "NAME")]
    pub actor: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Raise a new finding
    #[command(alias = "new")]
    Add(AddArgs),
    /// Change fields of an existing finding
    Update {
        /// Finding ID
        id: String,
        /// New status
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,
        /// Set an arbitrary column
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
        /// Reason recorded in the change log
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// List findings, newest first
    List {
        /// Only findings with this status
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,
        /// Number of findings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the change log, newest first
    Log {
        /// Only entries about this finding
        #[arg(long)]
        id: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export findings in workbook order
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Only findings with this status
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,
        /// Output file, or a directory to write a dated file into (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print a fresh unused finding ID
    NewId,
    /// List the studies findings can be raised against
    Studies {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Output file, or a directory to write the shell's usual file name into
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Study code (Código do Estudo), checked against the study catalog when one is configured
    #[arg(long)]
    pub study: String,
    /// Study name (Nome da Pesquisa), taken from the catalog when one is configured
    #[arg(long)]
    pub research_name: Option<String>,
    /// Document the finding is about (Documentos)
    #[arg(long)]
    pub document: String,
    /// Participant (Participante)
    #[arg(long)]
    pub participant: String,
    /// Who raised the finding (Responsável Pelo Apontamento)
    #[arg(long)]
    pub responsible: String,
    /// Description of the finding (Apontamento)
    #[arg(long)]
    pub finding: String,
    /// Initial status
    #[arg(long, value_parser = parse_status, default_value = "REALIZADO DURANTE A CONDUÇÃO")]
    pub status: Status,
    /// Origin of the finding
    #[arg(long)]
    pub origin: Option<String>,
    /// Study period
    #[arg(long)]
    pub period: Option<String>,
    /// Criticality grade
    #[arg(long)]
    pub criticality: Option<String>,
    /// Resolution deadline (dd/mm/yyyy)
    #[arg(long)]
    pub deadline: Option<String>,
    /// Verifier, required with VERIFICANDO
    #[arg(long)]
    pub verifier: Option<String>,
    /// Verification date (dd/mm/yyyy)
    #[arg(long)]
    pub verified_on: Option<String>,
    /// Justification, required with NÃO APLICÁVEL
    #[arg(long)]
    pub justification: Option<String>,
    /// Resolution date (dd/mm/yyyy), required with REALIZADO
    #[arg(long)]
    pub resolved_on: Option<String>,
    /// Set an arbitrary column
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub assignments: Vec<(String, String)>,
    /// Save even when the same study, document and participant already has a finding
    #[arg(long)]
    pub allow_duplicate: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for apontar_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

pub fn parse_status(raw: &str) -> Result<Status, String> {
    raw.parse::<Status>().map_err(|error| error.to_string())
}

pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("field name is empty in '{raw}'"));
    }
    if is_identity_field(field) {
        return Err("the ID column cannot be set".to_string());
    }
    Ok((field.to_string(), value.trim().to_string()))
}
