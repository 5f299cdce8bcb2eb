//! Couchbase storage implementation
//!
//! Provides persistent storage for filters, observations and species using Couchbase.

use async_trait::async_trait;
use chrono::Utc;
use couchbase::{
    cluster::Cluster,
    collection::Collection,
    options::{
        cluster_options::ClusterOptions,
        diagnostic_options::WaitUntilReadyOptions,
        kv_options::{GetOptions, RemoveOptions, UpsertOptions},
        query_options::{QueryOptions, ScanConsistency},
    },
};
use futures::stream::{self, StreamExt};

use couchbase::authenticator::{Authenticator, PasswordAuthenticator};

use species_filter_core::{Filter, Observation, Predicate, Species};
use std::sync::Arc;
use uuid::Uuid;

use crate::{FilterStorage, ObservationStorage, ObservationStream, SpeciesStorage, StorageError};

/// Document type markers for N1QL queries
const DOC_TYPE_FILTER: &str = "filter";
const DOC_TYPE_OBSERVATION: &str = "observation";
const DOC_TYPE_SPECIES: &str = "species";

/// Couchbase storage configuration
#[derive(Debug, Clone)]
pub struct CouchbaseConfig {
    pub connection_string: String,
    pub username: String,
    pub password: String,
    pub bucket_name: String,
}

impl Default for CouchbaseConfig {
    fn default() -> Self {
        Self {
            connection_string: "couchbase://localhost".to_string(),
            username: "admin".to_string(),
            password: "password123".to_string(),
            bucket_name: "species-filter".to_string(),
        }
    }
}

/// Couchbase storage for filters, observations and species
pub struct CouchbaseStorage {
    cluster: Arc<Cluster>,
    collection: Collection,
    bucket_name: String,
}

impl CouchbaseStorage {
    /// Create a new Couchbase storage instance
    pub async fn new(config: CouchbaseConfig) -> Result<Self, StorageError> {
        let authenticator = PasswordAuthenticator::new(&config.username, &config.password);
        let options = ClusterOptions::new(Authenticator::PasswordAuthenticator(authenticator));
        let cluster = Cluster::connect(&config.connection_string, options)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to connect to cluster: {}", e)))?;

        let bucket = cluster.bucket(&config.bucket_name);
        let _: () = bucket
            .wait_until_ready(WaitUntilReadyOptions::default())
            .await
            .map_err(|e: couchbase::error::Error| {
                StorageError::Connection(format!("Failed to connect to bucket: {}", e))
            })?;

        let collection = bucket.default_collection();

        tracing::info!(
            "Connected to Couchbase cluster at {}, bucket: {}",
            config.connection_string,
            config.bucket_name
        );

        Ok(Self {
            cluster: Arc::new(cluster),
            collection,
            bucket_name: config.bucket_name,
        })
    }

    /// Execute a N1QL query and collect its rows
    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        statement: &str,
    ) -> Result<Vec<T>, StorageError> {
        self.query_with(statement, QueryOptions::default()).await
    }

    /// Execute a N1QL query that must observe every completed write
    async fn query_consistent<T: serde::de::DeserializeOwned>(
        &self,
        statement: &str,
    ) -> Result<Vec<T>, StorageError> {
        let options = QueryOptions::default().scan_consistency(ScanConsistency::RequestPlus);
        self.query_with(statement, options).await
    }

    async fn query_with<T: serde::de::DeserializeOwned>(
        &self,
        statement: &str,
        options: QueryOptions,
    ) -> Result<Vec<T>, StorageError> {
        let mut result = self
            .cluster
            .query(statement, options)
            .await
            .map_err(|e: couchbase::error::Error| {
                StorageError::Internal(format!("Query failed: {}", e))
            })?;

        let mut rows = Vec::new();
        let mut row_iter = result.rows::<T>();

        while let Some(row) = tokio_stream::StreamExt::next(&mut row_iter).await {
            let row = row.map_err(|e| {
                StorageError::Internal(format!("Failed to deserialize row: {}", e))
            })?;
            rows.push(row);
        }

        Ok(rows)
    }

    /// Fetch a typed document by key
    async fn get_doc<T: serde::de::DeserializeOwned>(
        &self,
        doc_id: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.collection.get(doc_id, GetOptions::default()).await {
            Ok(result) => {
                let doc: TypedDocument<T> = result.content_as::<TypedDocument<T>>().map_err(|e| {
                    StorageError::Serialization(serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )))
                })?;
                Ok(Some(doc.data))
            }
            Err(e) => {
                if e.to_string().contains("DocumentNotFound") {
                    Ok(None)
                } else {
                    Err(StorageError::Internal(format!(
                        "Failed to get {}: {}",
                        doc_id, e
                    )))
                }
            }
        }
    }

    async fn put_doc<T: serde::Serialize + Clone>(
        &self,
        doc_type: &str,
        doc_id: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let doc = TypedDocument {
            doc_type: doc_type.to_string(),
            data: data.clone(),
        };

        let _ = self
            .collection
            .upsert(doc_id, &doc, UpsertOptions::default())
            .await
            .map_err(|e| StorageError::Internal(format!("Failed to save {}: {}", doc_id, e)))?;
        Ok(())
    }

    async fn check_species(&self, code: &str) -> Result<(), StorageError> {
        if SpeciesStorage::get_by_code(self, code).await?.is_none() {
            return Err(StorageError::InvalidReference(format!(
                "Species '{}' does not exist",
                code
            )));
        }
        Ok(())
    }

    /// WHERE clause selecting observations for a predicate
    fn observation_where(predicate: &Predicate) -> Result<String, StorageError> {
        let mut clause = format!(
            "o.type = '{}' AND o.species = {}",
            DOC_TYPE_OBSERVATION,
            literal(&predicate.species)?
        );
        if let Some(location) = &predicate.location {
            clause.push_str(&format!(
                " AND o.{} = {}",
                location.field.as_str(),
                literal(&location.value)?
            ));
        }
        Ok(clause)
    }
}

/// Quote a value as a N1QL string literal
fn literal(value: &str) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

fn filter_key(id: Uuid) -> String {
    format!("filter::{}", id)
}

fn observation_key(id: Uuid) -> String {
    format!("observation::{}", id)
}

fn species_key(code: &str) -> String {
    format!("species::{}", code)
}

/// Wrapper for documents with type field
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TypedDocument<T> {
    #[serde(rename = "type")]
    doc_type: String,
    #[serde(flatten)]
    data: T,
}

#[async_trait]
impl FilterStorage for CouchbaseStorage {
    async fn save(&self, filter: Filter) -> Result<Filter, StorageError> {
        let key = filter_key(filter.id);
        if self.get_doc::<Filter>(&key).await?.is_some() {
            return Err(StorageError::AlreadyExists(format!(
                "Filter with id {} already exists",
                filter.id
            )));
        }
        self.put_doc(DOC_TYPE_FILTER, &key, &filter).await?;

        tracing::debug!("Saved filter {}", filter.name);
        Ok(filter)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Filter>, StorageError> {
        self.get_doc(&filter_key(id)).await
    }

    async fn list(&self) -> Result<Vec<Filter>, StorageError> {
        let query = format!(
            r#"
            SELECT f.*
            FROM `{}` f
            WHERE f.type = '{}'
            ORDER BY f.created ASC
            "#,
            self.bucket_name, DOC_TYPE_FILTER
        );

        self.query(&query).await
    }

    async fn update(&self, mut filter: Filter) -> Result<Filter, StorageError> {
        if FilterStorage::get_by_id(self, filter.id).await?.is_none() {
            return Err(StorageError::NotFound(format!(
                "Filter with id {} not found",
                filter.id
            )));
        }
        filter.touch();
        self.put_doc(DOC_TYPE_FILTER, &filter_key(filter.id), &filter)
            .await?;
        Ok(filter)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        match self
            .collection
            .remove(&filter_key(id), RemoveOptions::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.to_string().contains("DocumentNotFound") {
                    Err(StorageError::NotFound(format!("Filter with id {} not found", id)))
                } else {
                    Err(StorageError::Internal(format!(
                        "Failed to delete filter: {}",
                        e
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl ObservationStorage for CouchbaseStorage {
    async fn save(&self, observation: Observation) -> Result<Observation, StorageError> {
        self.check_species(&observation.species).await?;
        self.put_doc(
            DOC_TYPE_OBSERVATION,
            &observation_key(observation.id),
            &observation,
        )
        .await?;
        Ok(observation)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Observation>, StorageError> {
        self.get_doc(&observation_key(id)).await
    }

    async fn find<'a>(
        &'a self,
        predicate: &Predicate,
    ) -> Result<ObservationStream<'a>, StorageError> {
        // Keys only; documents are fetched one by one as the stream is consumed.
        let query = format!(
            "SELECT RAW META(o).id FROM `{}` o WHERE {}",
            self.bucket_name,
            Self::observation_where(predicate)?
        );
        let keys: Vec<String> = self.query_consistent(&query).await?;
        tracing::debug!("Predicate {} selected {} observations", predicate, keys.len());

        // Documents changed since selection are re-checked and skipped if they
        // no longer match.
        let predicate = predicate.clone();
        let matches = stream::iter(keys)
            .then(move |key| async move { self.get_doc::<Observation>(&key).await })
            .filter_map(move |doc| {
                let next = match doc {
                    Ok(Some(o)) if predicate.matches(&o) => Some(Ok(o)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                };
                async move { next }
            });

        Ok(matches.boxed())
    }

    async fn count(&self, predicate: &Predicate) -> Result<usize, StorageError> {
        let query = format!(
            "SELECT RAW COUNT(*) FROM `{}` o WHERE {}",
            self.bucket_name,
            Self::observation_where(predicate)?
        );
        let counts: Vec<usize> = self.query_consistent(&query).await?;
        counts
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Internal("COUNT query returned no rows".to_string()))
    }

    async fn update(&self, mut observation: Observation) -> Result<Observation, StorageError> {
        let key = observation_key(observation.id);
        if self.get_doc::<Observation>(&key).await?.is_none() {
            return Err(StorageError::NotFound(format!(
                "Observation with id {} not found",
                observation.id
            )));
        }
        self.check_species(&observation.species).await?;
        observation.modified = Utc::now();
        self.put_doc(DOC_TYPE_OBSERVATION, &key, &observation).await?;
        Ok(observation)
    }
}

#[async_trait]
impl SpeciesStorage for CouchbaseStorage {
    async fn save(&self, species: Species) -> Result<Species, StorageError> {
        self.put_doc(DOC_TYPE_SPECIES, &species_key(&species.code), &species)
            .await?;
        tracing::debug!("Saved species {}", species.code);
        Ok(species)
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Species>, StorageError> {
        self.get_doc(&species_key(code)).await
    }
}
