//! Menu-driven session: the terminal counterpart of a single-page app.
//!
//! Every action returns to the root menu, which re-renders the current state.

use std::{fmt, sync::Arc};

use anyhow::Result;
use citywx_core::{FavoriteCity, WeatherApp};
use inquire::{InquireError, Select, Text};

use crate::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Search,
    UseLocation,
    SaveFavorite,
    ForgetFavorite,
    OpenFavorite,
    RemoveFavorite,
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Search => "Search for a city",
            Action::UseLocation => "Use my current location",
            Action::SaveFavorite => "Save this city",
            Action::ForgetFavorite => "Remove this city from saved",
            Action::OpenFavorite => "Open a saved city",
            Action::RemoveFavorite => "Remove a saved city",
            Action::Quit => "Quit",
        })
    }
}

/// Wrapper so favorites can be listed in a `Select`.
struct FavoriteChoice(FavoriteCity);

impl fmt::Display for FavoriteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render::favorite(&self.0))
    }
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    /// Ctrl-C at a prompt.
    Interrupted,
}

/// Outcome of a single prompt.
#[derive(Debug, PartialEq, Eq)]
enum Answer<T> {
    Value(T),
    /// Escape: back out of this prompt.
    Back,
    Interrupted,
}

impl<T> Answer<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Answer<U> {
        match self {
            Answer::Value(v) => Answer::Value(f(v)),
            Answer::Back => Answer::Back,
            Answer::Interrupted => Answer::Interrupted,
        }
    }
}

pub async fn run(app: Arc<WeatherApp>) -> Result<SessionEnd> {
    let indicator = tokio::spawn(loading_indicator(app.clone()));

    app.start().await;

    let outcome = menu_loop(&app).await;
    indicator.abort();
    outcome
}

async fn menu_loop(app: &WeatherApp) -> Result<SessionEnd> {
    loop {
        let state = app.snapshot();
        println!("\n{}", render::state(&state));

        let mut actions = vec![Action::Search, Action::UseLocation];
        if state.report.is_some() {
            if state.is_current_favorite() {
                actions.push(Action::ForgetFavorite);
            } else {
                actions.push(Action::SaveFavorite);
            }
        }
        if !state.favorites.is_empty() {
            actions.push(Action::OpenFavorite);
            actions.push(Action::RemoveFavorite);
        }
        actions.push(Action::Quit);

        let action = match answer(Select::new("What next?", actions).prompt())? {
            Answer::Value(action) => action,
            Answer::Back => return Ok(SessionEnd::Quit),
            Answer::Interrupted => return Ok(SessionEnd::Interrupted),
        };

        match action {
            Action::Search => {
                let prompt = Text::new("City:")
                    .with_initial_value(&state.search_text)
                    .prompt();
                match answer(prompt)? {
                    Answer::Value(text) => {
                        app.set_search_text(text);
                        app.submit_search().await;
                    }
                    Answer::Back => {}
                    Answer::Interrupted => return Ok(SessionEnd::Interrupted),
                }
            }
            Action::UseLocation => app.search_by_location().await,
            Action::SaveFavorite | Action::ForgetFavorite => {
                app.toggle_favorite();
            }
            Action::OpenFavorite => match pick_favorite(&state.favorites, "Open which city?")? {
                Answer::Value(city) => app.load_favorite(&city.name).await,
                Answer::Back => {}
                Answer::Interrupted => return Ok(SessionEnd::Interrupted),
            },
            Action::RemoveFavorite => {
                match pick_favorite(&state.favorites, "Remove which city?")? {
                    Answer::Value(city) => {
                        app.remove_favorite(city.id);
                    }
                    Answer::Back => {}
                    Answer::Interrupted => return Ok(SessionEnd::Interrupted),
                }
            }
            Action::Quit => return Ok(SessionEnd::Quit),
        }
    }
}

fn pick_favorite(
    favorites: &citywx_core::Favorites,
    message: &str,
) -> Result<Answer<FavoriteCity>> {
    let choices: Vec<FavoriteChoice> = favorites.iter().cloned().map(FavoriteChoice).collect();
    Ok(answer(Select::new(message, choices).prompt())?.map(|c| c.0))
}

/// Escape backs out of a prompt; Ctrl-C ends the session.
fn answer<T>(result: Result<T, InquireError>) -> Result<Answer<T>> {
    match result {
        Ok(value) => Ok(Answer::Value(value)),
        Err(InquireError::OperationCanceled) => Ok(Answer::Back),
        Err(InquireError::OperationInterrupted) => {
            tracing::debug!("session interrupted");
            Ok(Answer::Interrupted)
        }
        Err(e) => Err(e.into()),
    }
}

/// Prints a line whenever a query starts.
async fn loading_indicator(app: Arc<WeatherApp>) {
    let mut rx = app.subscribe();
    let mut was_loading = rx.borrow_and_update().loading;

    while rx.changed().await.is_ok() {
        let loading = rx.borrow_and_update().loading;
        if loading && !was_loading {
            eprintln!("Loading...");
        }
        was_loading = loading;
    }
}
