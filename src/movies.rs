//! Movie lookup: request builders for the free-text and tool-forced modes,
//! plus decoding of the `return_movie_info` tool input.
//!
//! Decoding is lenient: absent or mistyped fields fall back to empty values,
//! and every substitution is reported in [`MovieExtraction::issues`].

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::llm::backend::Provider;
use crate::llm::message::ChatMessage;
use crate::llm::request::{ChatRequest, InferenceOptions};
use crate::llm::response::ChatResponse;
use crate::llm::tools::{ToolConfig, ToolParam, ToolParamType, ToolSpec};

pub const MOVIE_TOOL_NAME: &str = "return_movie_info";

pub const DEFAULT_MOVIE_QUERY: &str = "Lord of the rings";

const FREE_TEXT_SYSTEM_PROMPT: &str = "You are a movie information expert. Always return the results as a JSON array of objects with the following fields: title, year, category, directors, actors, plot, genre, rating. The response should be a strict JSON array and nothing else.";

const TOOL_SYSTEM_PROMPT: &str = "You are a movie information expert";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("movie query must not be empty")]
    EmptyQuery,
}

/// Non-blank movie title or title fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieQuery(String);

impl MovieQuery {
    pub fn new(query: impl Into<String>) -> Result<Self, RequestError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        Ok(Self(query))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Free-text mode: the JSON shape is only requested in the prompt.
pub fn movie_text_request(query: &MovieQuery, inference: InferenceOptions) -> ChatRequest {
    let prompt = format!(
        "Provide detailed information about the movie '{}'. Return the results as a JSON array of objects with the following fields: title (string), year (integer), category (string, Movie/TV), directors (array of strings), actors (array of strings), plot (string), genre (string), rating (string). If no movie is found, return an empty JSON array. The response should be a strict JSON array and nothing else. If multiple movies match, return all of them in the array.",
        query.as_str()
    );
    ChatRequest::new(vec![ChatMessage::user(prompt)])
        .with_system(FREE_TEXT_SYSTEM_PROMPT)
        .with_inference(inference)
}

/// Tool-forced mode: the provider must answer through `return_movie_info`.
pub fn movie_tool_request(query: &MovieQuery, inference: InferenceOptions) -> ChatRequest {
    let prompt = format!(
        "Provide detailed information about the movie '{}'.",
        query.as_str()
    );
    ChatRequest::new(vec![ChatMessage::user(prompt)])
        .with_system(TOOL_SYSTEM_PROMPT)
        .with_tools(ToolConfig::forced(movie_info_tool()))
        .with_inference(inference)
}

/// Declaration of the `return_movie_info` tool.
pub fn movie_info_tool() -> ToolSpec {
    let movie = ToolParamType::Object(vec![
        ToolParam::required("title", ToolParamType::String, "The movie title"),
        ToolParam::required("year", ToolParamType::Integer, "The release year"),
        ToolParam::required(
            "category",
            ToolParamType::String,
            "Category to which this title belongs to. Like a TV show or Movie",
        ),
        ToolParam::required(
            "directors",
            ToolParamType::array_of(ToolParamType::String, Some("A director name")),
            "Array of director names",
        ),
        ToolParam::required(
            "actors",
            ToolParamType::array_of(ToolParamType::String, Some("An actor name")),
            "Array of actor names",
        ),
        ToolParam::required("plot", ToolParamType::String, "Brief plot summary"),
        ToolParam::required("genre", ToolParamType::String, "Movie genre"),
        ToolParam::required("rating", ToolParamType::String, "IMDb rating or similar"),
    ]);

    ToolSpec::new(
        MOVIE_TOOL_NAME,
        "Return structured movie information as an array to handle multiple matching movies",
    )
    .with_param(ToolParam::required(
        "movies",
        ToolParamType::array_of(movie, None),
        "Array of movie information objects",
    ))
}

/// One normalized movie record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredMovie {
    pub title: String,
    pub year: i64,
    pub category: String,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub plot: String,
    pub genre: String,
    pub rating: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    WrongType { expected: &'static str },
}

/// A field that was defaulted while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub index: usize,
    pub field: &'static str,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieExtraction {
    pub movies: Vec<StructuredMovie>,
    pub issues: Vec<FieldIssue>,
}

impl MovieExtraction {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Model did not use the expected tool")]
    ToolNotUsed,
    #[error("Expected 'movies' property in response")]
    MissingMovies,
    #[error("Expected 'movies' to be an array")]
    MoviesNotArray,
    #[error("Failed to extract movie info: movie at index {index} is not an object")]
    MovieNotObject { index: usize },
}

/// Decodes the `return_movie_info` tool input.
pub fn extract(input: &Value) -> Result<MovieExtraction, ExtractError> {
    let movies = input
        .as_object()
        .and_then(|root| root.get("movies"))
        .ok_or(ExtractError::MissingMovies)?
        .as_array()
        .ok_or(ExtractError::MoviesNotArray)?;

    let mut extraction = MovieExtraction::default();
    for (index, movie) in movies.iter().enumerate() {
        let fields = movie
            .as_object()
            .ok_or(ExtractError::MovieNotObject { index })?;
        let mut reader = FieldReader {
            index,
            fields,
            issues: &mut extraction.issues,
        };
        extraction.movies.push(StructuredMovie {
            title: reader.string("title"),
            year: reader.integer("year"),
            category: reader.string("category"),
            directors: reader.strings("directors"),
            actors: reader.strings("actors"),
            plot: reader.string("plot"),
            genre: reader.string("genre"),
            rating: reader.string("rating"),
        });
    }
    Ok(extraction)
}

struct FieldReader<'a> {
    index: usize,
    fields: &'a Map<String, Value>,
    issues: &'a mut Vec<FieldIssue>,
}

impl FieldReader<'_> {
    fn report(&mut self, field: &'static str, kind: IssueKind) {
        self.issues.push(FieldIssue {
            index: self.index,
            field,
            kind,
        });
    }

    fn lookup<T>(
        &mut self,
        field: &'static str,
        expected: &'static str,
        convert: impl FnOnce(&Value) -> Option<T>,
    ) -> Option<T> {
        let Some(value) = self.fields.get(field) else {
            self.report(field, IssueKind::Missing);
            return None;
        };
        let converted = convert(value);
        if converted.is_none() {
            self.report(field, IssueKind::WrongType { expected });
        }
        converted
    }

    fn string(&mut self, field: &'static str) -> String {
        self.lookup(field, "string", |value| value.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    fn integer(&mut self, field: &'static str) -> i64 {
        self.lookup(field, "integer", |value| {
            value.as_i64().or_else(|| {
                value
                    .as_f64()
                    .filter(|number| number.fract() == 0.0 && number.abs() < i64::MAX as f64)
                    .map(|number| number as i64)
            })
        })
        .unwrap_or_default()
    }

    fn strings(&mut self, field: &'static str) -> Vec<String> {
        let Some(items) = self.lookup(field, "array", |value| value.as_array().cloned()) else {
            return Vec::new();
        };
        let names: Vec<String> = items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect();
        if names.len() != items.len() {
            self.report(
                field,
                IssueKind::WrongType {
                    expected: "array of strings",
                },
            );
        }
        names
    }
}

/// Renders the tool-forced reply; failures become `{"error": ...}` payloads.
///
/// The first tool invocation is used whatever its name.
pub fn render_tool_response(response: &ChatResponse) -> String {
    let outcome = response
        .tool_use(None)
        .ok_or(ExtractError::ToolNotUsed)
        .and_then(|tool_use| extract(&tool_use.input));

    match outcome {
        Ok(extraction) => {
            for issue in &extraction.issues {
                tracing::warn!(
                    index = issue.index,
                    field = issue.field,
                    kind = ?issue.kind,
                    "movie field defaulted"
                );
            }
            serde_json::to_string_pretty(&extraction.movies)
                .unwrap_or_else(|err| error_payload(&format!("Failed to extract movie info: {err}")))
        }
        Err(err) => {
            tracing::warn!(error = %err, "tool response could not be decoded");
            error_payload(&err.to_string())
        }
    }
}

/// Payload printed when the provider replied without an assistant message.
pub fn render_invalid_response(provider: Provider) -> String {
    error_payload(&format!("Invalid response from {}", provider.display_name()))
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}
