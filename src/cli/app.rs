//! CLI application handler - processes CLI commands and interfaces with the
//! note store and the Gemini analysis client.

use std::{
    fs::read_to_string,
    io::{stdin, stdout, Write},
    path::PathBuf,
};

use log::info;

use crate::{
    build_prompt, export_xlsx, AuditError, Commands, Config, FileStore, GeminiClient, Note,
    NoteStore, Result, SaveOutcome, DEFAULT_EXPORT_FILE,
};

/// CLI application handler.
pub struct App {
    /// The note store, loaded from the persistence file at startup
    store: NoteStore<FileStore>,

    /// Application configuration
    config: Config,
}

impl App {
    /// Create a new CLI application with the given store and config
    pub fn new(store: NoteStore<FileStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Analyze {
                url,
                description,
                prompt_file,
                no_save,
            } => {
                self.analyze(url, description, prompt_file, no_save)
                    .await?
            }

            Commands::Add { url, description } => self.add(url, description)?,

            Commands::Edit {
                id,
                url,
                description,
            } => self.edit(id, url, description)?,

            Commands::Delete { id, force } => self.delete(id, force)?,

            Commands::List { limit, json } => self.list(limit, json)?,

            Commands::Export { output } => self.export(output)?,
        }

        Ok(())
    }

    /// Analyzes a repository with Gemini and, unless `no_save` is set,
    /// stores the result as a new note.
    ///
    /// The network call is the only suspension point; it is awaited to
    /// completion and cannot be cancelled once issued.
    async fn analyze(
        &mut self,
        url: String,
        description: Option<String>,
        prompt_file: Option<PathBuf>,
        no_save: bool,
    ) -> Result<()> {
        let template = match prompt_file {
            Some(path) => Some(read_to_string(&path)?),
            None => None,
        };
        let prompt = build_prompt(&url, template.as_deref())?;

        let client = GeminiClient::new(
            self.config.api_base.clone(),
            self.config.model.clone(),
            self.config.api_key.clone(),
        );

        println!("Analyzing {} ...", url);
        let result = client.analyze(&prompt).await?;

        println!("\nRating: {}", rating_label(result.rating));
        println!("\n{}", result.analysis);

        if let Some(meta) = &result.grounding_metadata {
            if let Some(query) = &meta.search_query {
                println!("\nSearch query: {}", query);
            }
            for chunk in meta.grounding_chunks.iter().flatten() {
                if let Some(web) = &chunk.web {
                    println!("Source: {} ({})", web.title, web.uri);
                }
            }
        }

        if no_save {
            return Ok(());
        }

        let note = Note::new(url, description.unwrap_or_default())
            .with_analysis(result.analysis, result.rating);
        let id = note.id.clone();
        self.store.save(note)?;
        println!("\nNote {} saved.", id);
        Ok(())
    }

    /// Saves a note without requesting an analysis.
    fn add(&mut self, url: String, description: Option<String>) -> Result<()> {
        if url.trim().is_empty() {
            return Err(AuditError::EmptyRepoUrl);
        }

        let note = Note::new(url, description.unwrap_or_default());
        let id = note.id.clone();
        self.store.save(note)?;
        println!("Note {} saved.", id);
        Ok(())
    }

    /// Updates the mutable fields of an existing note. The note's id and
    /// creation time are preserved.
    fn edit(&mut self, id: String, url: Option<String>, description: Option<String>) -> Result<()> {
        self.store.select(&id)?;

        // select() verified the id, so the selection is present
        let mut note = self
            .store
            .selected()
            .ok_or(AuditError::NoteNotFound { id: id.clone() })?
            .clone();

        if let Some(url) = url {
            if url.trim().is_empty() {
                return Err(AuditError::EmptyRepoUrl);
            }
            note.repo_url = url;
        }
        if let Some(description) = description {
            note.description = description;
        }

        let outcome = self.store.save(note)?;
        self.store.clear_selection();

        match outcome {
            SaveOutcome::Updated => println!("Note {} updated.", id),
            SaveOutcome::Created => println!("Note {} saved.", id),
        }
        Ok(())
    }

    /// Deletes a note, prompting for confirmation unless forced.
    fn delete(&mut self, id: String, force: bool) -> Result<()> {
        if !force && !confirm(&format!("Delete note {}? This cannot be undone.", id))? {
            println!("Aborted.");
            return Ok(());
        }

        if self.store.delete(&id)? {
            println!("Note {} deleted.", id);
        } else {
            println!("No note with id {} exists.", id);
        }
        Ok(())
    }

    /// Lists notes, newest first.
    fn list(&self, limit: usize, json: bool) -> Result<()> {
        let notes = &self.store.notes()[..limit.min(self.store.notes().len())];

        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!("No notes yet.");
            return Ok(());
        }

        for note in notes {
            println!(
                "{}  {}  [{}]  {}",
                note.id,
                note.created_at.format("%Y-%m-%d %H:%M"),
                rating_label(note.rating.unwrap_or(-1)),
                note.repo_url
            );
            if !note.description.is_empty() {
                println!("    {}", note.description);
            }
        }
        Ok(())
    }

    /// Exports the whole collection to an XLSX file.
    fn export(&self, output: Option<PathBuf>) -> Result<()> {
        let path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
        export_xlsx(self.store.notes(), &path)?;
        println!(
            "Exported {} notes to {}.",
            self.store.notes().len(),
            path.display()
        );
        info!("Export complete");
        Ok(())
    }
}

fn rating_label(rating: i32) -> String {
    if rating < 0 {
        "N/A".to_string()
    } else {
        format!("{}/10", rating)
    }
}

/// Prompts the user for a y/N answer on stdin.
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    stdout().flush()?;

    let mut answer = String::new();
    stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
