//! REST Backend Client
//!
//! Talks to the hosted backend-as-a-service through its PostgREST-style table
//! API (`/rest/v1/<table>`). Row-level access control lives on the server; the
//! client only forwards the project key and the user's access token.
//!
//! Hosted tables keep their original column names (`jogadores.preco`,
//! `escalacoes.goleiro_id`, ...). The row types below translate them.

use crate::domain::entities::lineup::{Lineup, Slot};
use crate::domain::entities::player::{Player, PlayerStatus, Position, TeamInfo};
use crate::domain::entities::round::{Round, RoundStatus};
use crate::domain::repositories::market_backend::{
    BackendError, BackendResult, BudgetSource, LineupStore, PlayerCatalog, RoundSource,
    SaveOutcome,
};
use crate::domain::value_objects::cartoletas::Cartoletas;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

const REST_PATH: &str = "rest/v1/";

const PLAYERS_TABLE: &str = "jogadores";
const USERS_TABLE: &str = "usuarios";
const ROUNDS_TABLE: &str = "rodadas";
const LINEUPS_TABLE: &str = "escalacoes";

const SAVED_LINEUP_SELECT: &str = "*,\
goleiro:jogadores!escalacoes_goleiro_id_fkey(*),\
fixo:jogadores!escalacoes_fixo_id_fkey(*),\
ala1:jogadores!escalacoes_ala1_id_fkey(*),\
ala2:jogadores!escalacoes_ala2_id_fkey(*),\
pivo:jogadores!escalacoes_pivo_id_fkey(*)";

#[derive(Debug, Clone)]
pub struct RestBackendConfig {
    /// Project URL, e.g. "https://project.supabase.co"
    pub base_url: String,
    /// Public project key sent as `apikey`
    pub anon_key: String,
    /// Signed-in user's token; falls back to the anon key
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl RestBackendConfig {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            anon_key: anon_key.to_string(),
            access_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamRow {
    #[serde(rename = "nome")]
    name: String,
    #[serde(rename = "escudo", default)]
    crest_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerRow {
    id: i64,
    #[serde(rename = "nome")]
    name: String,
    #[serde(rename = "posicao")]
    position: String,
    #[serde(rename = "preco")]
    price: f64,
    status: String,
    #[serde(rename = "time_id", default)]
    team_id: Option<i64>,
    #[serde(rename = "foto_url", default)]
    photo_url: Option<String>,
    #[serde(rename = "times", default)]
    team: Option<TeamRow>,
}

impl TryFrom<PlayerRow> for Player {
    type Error = BackendError;

    fn try_from(row: PlayerRow) -> Result<Self, Self::Error> {
        let position = Position::from_label(&row.position).ok_or_else(|| {
            BackendError::Decode(format!("Unknown position '{}' for player {}", row.position, row.id))
        })?;
        let status = PlayerStatus::from_label(&row.status).ok_or_else(|| {
            BackendError::Decode(format!("Unknown status '{}' for player {}", row.status, row.id))
        })?;
        let price = Cartoletas::from_f64(row.price).map_err(BackendError::Decode)?;

        let mut player = Player::new(row.id, row.name, position, price)
            .map_err(BackendError::Decode)?
            .with_status(status);
        if let Some(team_id) = row.team_id {
            let team = row.team.map(|t| TeamInfo {
                name: t.name,
                crest_url: t.crest_url,
            });
            player = player.with_team(team_id, team);
        }
        if let Some(photo_url) = row.photo_url {
            player = player.with_photo(photo_url);
        }
        Ok(player)
    }
}

#[derive(Debug, Deserialize)]
struct UserRow {
    cartoletas: f64,
}

#[derive(Debug, Deserialize)]
struct RoundRow {
    id: i64,
    #[serde(rename = "numero")]
    number: u32,
    status: String,
}

#[derive(Debug, Deserialize)]
struct SavedLineupRow {
    #[serde(rename = "goleiro")]
    goalkeeper: PlayerRow,
    #[serde(rename = "fixo")]
    fixed: PlayerRow,
    #[serde(rename = "ala1")]
    wing1: PlayerRow,
    #[serde(rename = "ala2")]
    wing2: PlayerRow,
    #[serde(rename = "pivo")]
    pivot: PlayerRow,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

#[derive(Debug, Serialize, PartialEq)]
struct LineupPayload<'a> {
    usuario_id: &'a str,
    rodada_id: i64,
    goleiro_id: i64,
    fixo_id: i64,
    ala1_id: i64,
    ala2_id: i64,
    pivo_id: i64,
    custo_total: f64,
    pontos_rodada: f64,
}

impl<'a> LineupPayload<'a> {
    fn new(user_id: &'a str, round_id: i64, lineup: &Lineup) -> BackendResult<Self> {
        let id = |slot: Slot| {
            lineup
                .get(slot)
                .map(|p| p.id)
                .ok_or_else(|| BackendError::Storage(format!("Lineup slot {} is empty", slot)))
        };
        Ok(Self {
            usuario_id: user_id,
            rodada_id: round_id,
            goleiro_id: id(Slot::Goalkeeper)?,
            fixo_id: id(Slot::Fixed)?,
            ala1_id: id(Slot::Wing1)?,
            ala2_id: id(Slot::Wing2)?,
            pivo_id: id(Slot::Pivot)?,
            custo_total: lineup.total_cost().as_f64(),
            pontos_rodada: 0.0,
        })
    }
}

/// Translate an error response into a backend error, keeping the server message
fn map_status(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("msg"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Authentication(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Storage(format!("{} {}", status.as_u16(), message)),
    }
}

pub struct RestBackendClient {
    client: Client,
    config: RestBackendConfig,
    rest_base: Url,
}

impl RestBackendClient {
    pub fn new(config: RestBackendConfig) -> BackendResult<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| BackendError::Network(format!("Invalid backend URL: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_base = base
            .join(REST_PATH)
            .map_err(|e| BackendError::Network(format!("Invalid backend URL: {}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        info!("REST backend client ready: {}", rest_base);
        Ok(Self {
            client,
            config,
            rest_base,
        })
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> BackendResult<Url> {
        let mut url = self
            .rest_base
            .join(table)
            .map_err(|e| BackendError::Network(format!("Invalid table URL: {}", e)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.anon_key);
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = self.authorize(request).send().await.map_err(|e| {
            error!("Backend request failed: {}", e);
            BackendError::Network(e.to_string())
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Backend returned {}: {}", status, body);
        Err(map_status(status, &body))
    }

    async fn get_rows<T: DeserializeOwned>(&self, url: Url) -> BackendResult<Vec<T>> {
        debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn find_lineup_id(&self, user_id: &str, round_id: i64) -> BackendResult<Option<i64>> {
        let url = self.table_url(
            LINEUPS_TABLE,
            &[
                ("select", "id".to_string()),
                ("usuario_id", format!("eq.{}", user_id)),
                ("rodada_id", format!("eq.{}", round_id)),
            ],
        )?;
        let rows: Vec<IdRow> = self.get_rows(url).await?;
        Ok(rows.first().map(|r| r.id))
    }
}

#[async_trait]
impl PlayerCatalog for RestBackendClient {
    async fn fetch_available_players(&self) -> BackendResult<Vec<Player>> {
        let url = self.table_url(
            PLAYERS_TABLE,
            &[
                ("select", "*,times(nome,escudo)".to_string()),
                ("status", format!("eq.{}", PlayerStatus::Available.label())),
                ("order", "preco.desc".to_string()),
            ],
        )?;
        let rows: Vec<PlayerRow> = self.get_rows(url).await?;
        rows.into_iter().map(Player::try_from).collect()
    }
}

#[async_trait]
impl BudgetSource for RestBackendClient {
    async fn fetch_current_budget(&self, user_id: &str) -> BackendResult<Cartoletas> {
        let url = self.table_url(
            USERS_TABLE,
            &[
                ("select", "cartoletas".to_string()),
                ("id", format!("eq.{}", user_id)),
            ],
        )?;
        let rows: Vec<UserRow> = self.get_rows(url).await?;
        let row = rows
            .first()
            .ok_or_else(|| BackendError::NotFound(format!("User {}", user_id)))?;
        Cartoletas::from_f64(row.cartoletas).map_err(BackendError::Decode)
    }
}

#[async_trait]
impl RoundSource for RestBackendClient {
    async fn fetch_active_round(&self) -> BackendResult<Option<Round>> {
        let url = self.table_url(
            ROUNDS_TABLE,
            &[
                ("select", "*".to_string()),
                ("status", format!("eq.{}", RoundStatus::InProgress.label())),
                ("limit", "1".to_string()),
            ],
        )?;
        let rows: Vec<RoundRow> = self.get_rows(url).await?;
        rows.into_iter()
            .next()
            .map(|row| -> BackendResult<Round> {
                let status = RoundStatus::from_label(&row.status).ok_or_else(|| {
                    BackendError::Decode(format!("Unknown round status '{}'", row.status))
                })?;
                Ok(Round::new(row.id, row.number, status))
            })
            .transpose()
    }
}

#[async_trait]
impl LineupStore for RestBackendClient {
    async fn fetch_saved_lineup(
        &self,
        user_id: &str,
        round_id: i64,
    ) -> BackendResult<Option<Lineup>> {
        let url = self.table_url(
            LINEUPS_TABLE,
            &[
                ("select", SAVED_LINEUP_SELECT.to_string()),
                ("usuario_id", format!("eq.{}", user_id)),
                ("rodada_id", format!("eq.{}", round_id)),
            ],
        )?;
        let rows: Vec<SavedLineupRow> = self.get_rows(url).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let assignments = vec![
            (Slot::Goalkeeper, Player::try_from(row.goalkeeper)?),
            (Slot::Fixed, Player::try_from(row.fixed)?),
            (Slot::Wing1, Player::try_from(row.wing1)?),
            (Slot::Wing2, Player::try_from(row.wing2)?),
            (Slot::Pivot, Player::try_from(row.pivot)?),
        ];
        Lineup::from_assignments(assignments)
            .map(Some)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn save_lineup(
        &self,
        user_id: &str,
        round_id: i64,
        lineup: &Lineup,
    ) -> BackendResult<SaveOutcome> {
        let payload = LineupPayload::new(user_id, round_id, lineup)?;

        match self.find_lineup_id(user_id, round_id).await? {
            Some(id) => {
                let url = self.table_url(LINEUPS_TABLE, &[("id", format!("eq.{}", id))])?;
                self.send(self.client.patch(url).json(&payload)).await?;
                info!("Lineup {} updated for {} in round {}", id, user_id, round_id);
                Ok(SaveOutcome::Updated)
            }
            None => {
                let url = self.table_url(LINEUPS_TABLE, &[])?;
                self.send(
                    self.client
                        .post(url)
                        .header("Prefer", "return=minimal")
                        .json(&[&payload]),
                )
                .await?;
                info!("Lineup created for {} in round {}", user_id, round_id);
                Ok(SaveOutcome::Created)
            }
        }
    }
}
