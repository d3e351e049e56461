//! Tantivy-based search index module.
//!
//! Provides full-text search over missions with field boosting. SQLite stays
//! the source of truth; the index only maps text to mission ids.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Mission;

const BOOST_TITLE: f32 = 10.0;
const BOOST_LOCATION: f32 = 6.0;
const BOOST_CATEGORY: f32 = 4.0;
const BOOST_DESCRIPTION: f32 = 3.0;

/// Search hit with the mission id and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub mission_id: String,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    mission_id: Field,
    title: Field,
    location: Field,
    category: Field,
    description: Field,
}

/// Tantivy search index for missions.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // Raw, untokenized id so updates can delete by term
        let mission_id = schema_builder.add_text_field("mission_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT);
        let location = schema_builder.add_text_field("location", TEXT);
        let category = schema_builder.add_text_field("category", TEXT);
        let description = schema_builder.add_text_field("description", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            mission_id,
            title,
            location,
            category,
            description,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000)
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from the stored missions.
    pub async fn rebuild(&self, missions: &[Mission]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for mission in missions {
            writer.add_document(self.create_document(mission))?;
        }
        writer.commit()?;

        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} missions", missions.len());
        Ok(())
    }

    /// Index a single mission, replacing any previous document for it.
    pub async fn index_mission(&self, mission: &Mission) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.mission_id, &mission.id));
        writer.add_document(self.create_document(mission))?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search for missions matching the query, best match first.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let window = limit
            .checked_add(offset)
            .ok_or_else(|| AppError::Validation("Search offset is too large".to_string()))?;

        let searcher = self.reader.searcher();

        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.location, BOOST_LOCATION),
            (self.fields.category, BOOST_CATEGORY),
            (self.fields.description, BOOST_DESCRIPTION),
        ];

        // Free text from the search box, so syntax errors are tolerated
        let subqueries: Vec<(Occur, Box<dyn Query>)> = field_queries
            .into_iter()
            .map(|(field, boost)| {
                let (query, _errors) =
                    QueryParser::for_index(&self.index, vec![field]).parse_query_lenient(query_str);
                let boosted: Box<dyn Query> = Box::new(BoostQuery::new(query, boost));
                (Occur::Should, boosted)
            })
            .collect();
        let combined_query = BooleanQuery::new(subqueries);

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(window))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let mission_id = doc.get_first(self.fields.mission_id)?.as_str()?.to_string();
                Some(SearchResult { mission_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, mission: &Mission) -> TantivyDocument {
        doc!(
            self.fields.mission_id => mission.id.clone(),
            self.fields.title => mission.title.clone(),
            self.fields.location => mission.location.clone(),
            self.fields.category => mission.category.as_str(),
            self.fields.description => mission.description.clone()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_mission, MissionCategory};
    use tempfile::TempDir;

    fn mission(id: &str, title: &str, location: &str, description: &str) -> Mission {
        Mission {
            id: id.to_string(),
            title: title.to_string(),
            location: location.to_string(),
            description: description.to_string(),
            ..sample_mission()
        }
    }

    #[tokio::test]
    async fn test_title_outranks_description() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let missions = vec![
            mission("1", "Medical Camp", "Marikina", "Bring water for the medics"),
            mission("2", "Water Distribution", "Pasig", "Bottled drinking supplies"),
        ];
        index.rebuild(&missions).await.unwrap();

        let results = index.search("water", 10, 0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].mission_id, "2");
    }

    #[tokio::test]
    async fn test_search_by_location_and_category() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let mut shelter = mission("2", "Evacuation Center", "Tacloban", "Cots needed");
        shelter.category = MissionCategory::Shelter;
        index
            .rebuild(&[mission("1", "Relief Packing", "Quezon City", "Rice"), shelter])
            .await
            .unwrap();

        let results = index.search("tacloban", 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].mission_id, "2");

        let results = index.search("shelter", 10, 0).unwrap();
        assert_eq!(results[0].mission_id, "2");
    }

    #[tokio::test]
    async fn test_reindex_replaces_document() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let mut m = mission("m-1", "Road Clearing", "Baguio", "Chainsaws");
        index.index_mission(&m).await.unwrap();
        m.title = "Debris Removal".to_string();
        index.index_mission(&m).await.unwrap();

        assert!(index.search("clearing", 10, 0).unwrap().is_empty());
        assert_eq!(index.search("debris", 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_empty_and_malformed_queries() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();
        index.rebuild(&[sample_mission()]).await.unwrap();

        assert!(index.search("   ", 10, 0).unwrap().is_empty());
        assert!(index.search("food AND (", 10, 0).is_ok());
    }

    #[tokio::test]
    async fn test_pagination() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let missions: Vec<Mission> = (0..5)
            .map(|i| mission(&i.to_string(), "Flood Response", "Manila", "Sandbags"))
            .collect();
        index.rebuild(&missions).await.unwrap();

        assert_eq!(index.search("flood", 2, 0).unwrap().len(), 2);
        assert_eq!(index.search("flood", 10, 3).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_degenerate_paging() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();
        index.rebuild(&[sample_mission()]).await.unwrap();

        assert!(index.search("food", 0, 0).unwrap().is_empty());
        let err = index.search("food", 20, usize::MAX).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
