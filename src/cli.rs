use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{Local, NaiveDate};
use console::{pad_str, style, Alignment, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

use crate::args::{Args, Command, SettingsCommand};
use crate::config::{self, Settings, SETTINGS_FILE};
use crate::db::{FileBlobStore, LedgerStore, Record, RecordId, Source, TimeRange};
use crate::format::{format_file_size, format_number};
use crate::import::{
    self, parse_amount_str, Candidate, EntryKind, FilePreview, ImportSettings, ManualEntry,
};
use crate::terminal::{self, BulletPointPrinter, LineWriter};

pub async fn main(args: Args) -> Result<()> {
    let cli = Cli::new(args.data_dir);
    match args.command {
        Command::Import { files, year, yes } => cli.main_import(files, year, yes).await,
        Command::Add {
            amount,
            kind,
            date,
            description,
        } => cli.main_add(amount, kind, date, description).await,
        Command::List { range } => cli.main_list(range).await,
        Command::Delete { id } => cli.main_delete(RecordId::new(id)).await,
        Command::Clear { yes } => cli.main_clear(yes).await,
        Command::Backup { path } => cli.main_backup(&path).await,
        Command::Restore { path } => cli.main_restore(&path).await,
        Command::Settings { command } => cli.main_settings(command).await,
    }
}

pub struct Cli {
    ledger: LedgerStore<FileBlobStore>,
    settings_path: PathBuf,
}

impl Cli {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE),
            ledger: LedgerStore::new(FileBlobStore::new(data_dir)),
        }
    }

    pub async fn main_import(&self, files: Vec<PathBuf>, year: Option<i32>, yes: bool) -> Result<()> {
        let settings = config::load(&self.settings_path).await?;
        // Settings are fixed for the whole batch
        let import_settings = ImportSettings::new(&settings, year)?;
        let existing = self
            .ledger
            .load_strict()
            .await
            .context("Failed to load ledger")?;

        let mut files_with_size = Vec::with_capacity(files.len());
        for path in files {
            let size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
            files_with_size.push((path, size));
        }
        let candidates =
            import::screen_candidates(files_with_size, &import_settings.pattern, &existing);

        println!("{}", style_header("Selected files:"));
        let printer = BulletPointPrinter::new_stdout();
        for candidate in &candidates {
            print_candidate(&printer, candidate);
        }
        let num_valid = candidates.iter().filter(|c| c.is_valid()).count();
        if num_valid == 0 {
            bail!("None of the selected files can be imported");
        }

        println!();
        let bar = ProgressBar::new(num_valid as u64);
        bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
        let previews = {
            let bar_printer = BulletPointPrinter::new_progress_bar(&bar);
            import::preview_candidates(&candidates, &import_settings, |preview| {
                bar.inc(1);
                if let Some(err) = preview.error() {
                    bar_printer.print_item(format!("{}: {}", preview.filename, style(err).red()));
                }
            })
            .await
        };
        bar.finish_and_clear();

        println!("{}", style_header("Preview:"));
        for preview in &previews {
            print_preview(&printer, preview);
        }
        let num_importable = previews.iter().filter(|p| p.is_importable()).count();
        println!(
            "{} of {} files, total {}",
            num_importable,
            previews.len(),
            style_total(import::preview_total(&previews)),
        );
        if num_importable == 0 {
            bail!("Nothing to import");
        }

        if !yes && !terminal::confirm(&format!("Import {num_importable} records?"))? {
            println!("Import cancelled");
            return Ok(());
        }
        let outcome = self
            .ledger
            .import_batch(import::importable_records(previews))
            .await?;
        for duplicate in &outcome.duplicates {
            log::warn!("Skipped {}: file already imported", duplicate.title());
        }
        println!("Imported {} records", outcome.accepted.len());
        Ok(())
    }

    pub async fn main_add(
        &self,
        amount: Option<String>,
        kind: EntryKind,
        date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Result<()> {
        let amount = match amount {
            Some(amount) => amount,
            None => terminal::input("Amount")?,
        };
        let amount = parse_amount_str(&amount)
            .map_err(|err| anyhow!("Invalid amount: {err}"))?;
        let record = import::build_manual_record(ManualEntry {
            date: date.unwrap_or_else(|| Local::now().date_naive()),
            amount,
            kind,
            description,
        });
        println!("{}", style_header("Adding record:"));
        print_record(&BulletPointPrinter::new_stdout(), &record);
        self.ledger.add(record).await?;
        Ok(())
    }

    pub async fn main_list(&self, range: TimeRange) -> Result<()> {
        // Reading only, so a broken ledger is shown as empty instead of failing
        let records = self.ledger.load().await;
        let records = range.filter(&records, Local::now().date_naive());
        println!("{}", style_header("Records:"));
        if records.is_empty() {
            println!("(none)");
        } else {
            let printer = BulletPointPrinter::new_stdout();
            for record in &records {
                print_record(&printer, record);
            }
        }
        println!(
            "Total: {}",
            style_total(crate::db::total(records.iter().copied()))
        );
        Ok(())
    }

    pub async fn main_delete(&self, id: RecordId) -> Result<()> {
        match self.ledger.delete(&id).await? {
            Some(record) => {
                println!("{}", style_header("Deleted record:"));
                print_record(&BulletPointPrinter::new_stdout(), &record);
            }
            None => println!("No record with id {id}"),
        }
        Ok(())
    }

    pub async fn main_clear(&self, yes: bool) -> Result<()> {
        if !yes && !terminal::confirm("Remove all records? This can't be undone.")? {
            return Ok(());
        }
        self.ledger.clear().await?;
        println!("Ledger cleared");
        Ok(())
    }

    pub async fn main_backup(&self, path: &Path) -> Result<()> {
        let content = self.ledger.export_backup().await?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write backup to {}", path.display()))?;
        println!("Backup written to {}", path.display());
        Ok(())
    }

    pub async fn main_restore(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read backup from {}", path.display()))?;
        let records = self
            .ledger
            .restore_backup(&content)
            .await
            .context("Failed to restore backup")?;
        println!("Restored backup, ledger has {} records", records.len());
        Ok(())
    }

    pub async fn main_settings(&self, command: SettingsCommand) -> Result<()> {
        let settings = match command {
            SettingsCommand::Show => config::load(&self.settings_path).await?,
            SettingsCommand::Edit => {
                let current = config::load(&self.settings_path).await?;
                let edited = config::prompt_edit(&current)?;
                config::save(&edited, &self.settings_path).await?;
                edited
            }
            SettingsCommand::Reset => {
                let defaults = Settings::default();
                config::save(&defaults, &self.settings_path).await?;
                defaults
            }
        };
        print!("{}", serde_yaml::to_string(&settings)?);
        Ok(())
    }
}

fn print_candidate<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, candidate: &Candidate) {
    let size = candidate
        .size
        .map(format_file_size)
        .unwrap_or_else(|| "?".to_string());
    let details = style(format!("({}, {})", candidate.file_type(), size)).dim();
    match candidate.status.reason() {
        None => printer.print_item(format!("{} {}", style(&candidate.filename).cyan(), details)),
        Some(reason) => printer.print_item(format!(
            "{} {} {}",
            style(&candidate.filename).dim(),
            details,
            style(reason).yellow()
        )),
    }
}

fn print_preview<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, preview: &FilePreview) {
    let date = preview
        .date
        .map(|date| style_date(&date).to_string())
        .unwrap_or_else(|| "????-??-??".to_string());
    let cell = preview.cell_address.as_deref().unwrap_or("-");
    let outcome = match &preview.amount {
        Ok(amount) => style_amount(*amount).to_string(),
        Err(_) => style("skipped".to_string()).red().to_string(),
    };
    printer.print_item(format!(
        "{} {} {} {}",
        pad_str(&date, 10, Alignment::Left, None),
        pad_str(cell, 5, Alignment::Left, None),
        outcome,
        style(&preview.filename).italic(),
    ));
    if let Some(err) = preview.error() {
        printer.indent().print_item(style(err).red());
    }
}

fn print_record<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, record: &Record) {
    let source = match record.source() {
        Source::Manual => style("manual").magenta(),
        Source::File => style("file").blue(),
    };
    printer.print_item(format!(
        "{} {} {} [{}] {}",
        pad_str(
            &style_date(&record.date()).to_string(),
            10,
            Alignment::Left,
            None
        ),
        pad_str(
            &style_amount(record.amount()).to_string(),
            15,
            Alignment::Right,
            None
        ),
        style(record.title()).italic(),
        source,
        style(record.id()).dim(),
    ));
}

fn style_header(header: &str) -> StyledObject<&str> {
    style(header).bold().underlined()
}

fn style_date(date: &NaiveDate) -> StyledObject<String> {
    style(date.format("%Y-%m-%d").to_string())
}

fn style_total(total: Option<Decimal>) -> StyledObject<String> {
    match total {
        Some(total) => style_amount(total),
        None => style("too large to display".to_string()).red(),
    }
}

fn style_amount(amount: Decimal) -> StyledObject<String> {
    let result = style(format_number(amount)).bold();
    if amount < Decimal::ZERO {
        result.red()
    } else {
        result.green()
    }
}
