//! SQLite-backed index store: documents, postings, document frequencies,
//! corpus statistics, the link graph and PageRank scores.

use crate::index::{CorpusStats, DocId, DocRecord, LinkGraph, Posting};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::fs::create_dir_all;
use std::path::Path;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS docs (
    doc_id INTEGER PRIMARY KEY,
    url TEXT UNIQUE,
    title TEXT,
    path TEXT UNIQUE,
    length INTEGER
);

CREATE TABLE IF NOT EXISTS postings (
    term TEXT,
    doc_id INTEGER,
    tf INTEGER,
    PRIMARY KEY (term, doc_id)
);

CREATE TABLE IF NOT EXISTS df (
    term TEXT PRIMARY KEY,
    doc_freq INTEGER
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value REAL
);

CREATE TABLE IF NOT EXISTS links (
    from_doc_id INTEGER REFERENCES docs(doc_id),
    to_doc_id INTEGER REFERENCES docs(doc_id)
);

CREATE TABLE IF NOT EXISTS pagerank (
    doc_id INTEGER PRIMARY KEY REFERENCES docs(doc_id),
    rank REAL
);

CREATE INDEX IF NOT EXISTS idx_links_from ON links(from_doc_id);
CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_doc_id);
CREATE INDEX IF NOT EXISTS idx_postings_term ON postings(term);
CREATE INDEX IF NOT EXISTS idx_postings_doc ON postings(doc_id);
"#;

pub const META_NUM_DOCS: &str = "N";
pub const META_AVGDL: &str = "avgdl";

pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open (creating if needed) the database file and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening index database {}", path.display()))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL).context("initializing index schema")?;
        Ok(Self { conn })
    }

    /// Start a full rebuild: every indexer-owned row is deleted inside one
    /// transaction that becomes visible only on [`Rebuild::commit`].
    ///
    /// PageRank rows go too, since doc ids are only stable within a run.
    pub fn rebuild(&mut self) -> Result<Rebuild<'_>> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM pagerank;
             DELETE FROM links;
             DELETE FROM postings;
             DELETE FROM df;
             DELETE FROM meta;
             DELETE FROM docs;",
        )?;
        Ok(Rebuild { tx })
    }

    pub fn corpus_stats(&self) -> Result<CorpusStats> {
        let num_docs = self.meta_value(META_NUM_DOCS)?.unwrap_or(0.0);
        let avgdl = self.meta_value(META_AVGDL)?.unwrap_or(0.0);
        Ok(CorpusStats { num_docs: num_docs as u32, avgdl })
    }

    fn meta_value(&self, key: &str) -> Result<Option<f64>> {
        let v = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |r| r.get(0))
            .optional()?;
        Ok(v)
    }

    pub fn doc_freq(&self, term: &str) -> Result<Option<u32>> {
        let v = self
            .conn
            .query_row("SELECT doc_freq FROM df WHERE term = ?1", [term], |r| r.get(0))
            .optional()?;
        Ok(v)
    }

    /// `(doc_id, tf, document length)` for every posting of `term`.
    pub fn term_postings(&self, term: &str) -> Result<Vec<(DocId, u32, u32)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT p.doc_id, p.tf, COALESCE(d.length, 0)
             FROM postings p LEFT JOIN docs d ON d.doc_id = p.doc_id
             WHERE p.term = ?1
             ORDER BY p.doc_id",
        )?;
        let rows = stmt.query_map([term], |r| {
            Ok((r.get::<_, DocId>(0)?, r.get::<_, u32>(1)?, r.get::<_, u32>(2)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn document(&self, doc_id: DocId) -> Result<Option<DocRecord>> {
        let v = self
            .conn
            .query_row(
                "SELECT doc_id, url, title, path, length FROM docs WHERE doc_id = ?1",
                [doc_id],
                doc_from_row,
            )
            .optional()?;
        Ok(v)
    }

    pub fn documents(&self) -> Result<Vec<DocRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc_id, url, title, path, length FROM docs ORDER BY doc_id")?;
        let rows = stmt.query_map([], doc_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn postings(&self) -> Result<Vec<Posting>> {
        let mut stmt = self
            .conn
            .prepare("SELECT term, doc_id, tf FROM postings ORDER BY term, doc_id")?;
        let rows = stmt.query_map([], |r| Ok(Posting { term: r.get(0)?, doc_id: r.get(1)?, tf: r.get(2)? }))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn doc_freqs(&self) -> Result<BTreeMap<String, u32>> {
        let mut stmt = self.conn.prepare("SELECT term, doc_freq FROM df")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u32>(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
    }

    pub fn links(&self) -> Result<Vec<(DocId, DocId)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT from_doc_id, to_doc_id FROM links ORDER BY from_doc_id, to_doc_id")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, DocId>(0)?, r.get::<_, DocId>(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every document as a node; edges whose endpoints are not documents
    /// are ignored.
    pub fn load_graph(&self) -> Result<LinkGraph> {
        let mut graph: LinkGraph = self.documents()?.into_iter().map(|d| (d.doc_id, Vec::new())).collect();
        for (from, to) in self.links()? {
            if !graph.contains_key(&to) {
                continue;
            }
            if let Some(out) = graph.get_mut(&from) {
                out.push(to);
            }
        }
        Ok(graph)
    }

    /// Upsert scores keyed by doc id.
    pub fn save_pagerank(&mut self, scores: &BTreeMap<DocId, f64>) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT OR REPLACE INTO pagerank(doc_id, rank) VALUES (?1, ?2)")?;
            for (doc_id, rank) in scores {
                stmt.execute(params![doc_id, rank])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn pagerank(&self, doc_id: DocId) -> Result<Option<f64>> {
        let v = self
            .conn
            .query_row("SELECT rank FROM pagerank WHERE doc_id = ?1", [doc_id], |r| r.get(0))
            .optional()?;
        Ok(v)
    }

    pub fn max_pagerank(&self) -> Result<Option<f64>> {
        let v: Option<f64> = self.conn.query_row("SELECT MAX(rank) FROM pagerank", [], |r| r.get(0))?;
        Ok(v)
    }
}

fn doc_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<DocRecord> {
    Ok(DocRecord {
        doc_id: r.get(0)?,
        url: r.get(1)?,
        title: r.get(2)?,
        path: r.get(3)?,
        length: r.get(4)?,
    })
}

/// Write side of a full index rebuild.
pub struct Rebuild<'a> {
    tx: Transaction<'a>,
}

impl Rebuild<'_> {
    pub fn insert_document(&self, doc: &DocRecord) -> Result<()> {
        self.tx
            .prepare_cached("INSERT INTO docs(doc_id, url, title, path, length) VALUES (?1, ?2, ?3, ?4, ?5)")?
            .execute(params![doc.doc_id, doc.url, doc.title, doc.path, doc.length])
            .with_context(|| format!("inserting document {}", doc.url))?;
        Ok(())
    }

    pub fn insert_postings(&self, doc_id: DocId, term_freqs: &BTreeMap<String, u32>) -> Result<()> {
        let mut stmt = self.tx.prepare_cached("INSERT INTO postings(term, doc_id, tf) VALUES (?1, ?2, ?3)")?;
        for (term, tf) in term_freqs {
            stmt.execute(params![term, doc_id, tf])?;
        }
        Ok(())
    }

    pub fn insert_doc_freqs(&self, df: &BTreeMap<String, u32>) -> Result<()> {
        let mut stmt = self.tx.prepare_cached("INSERT INTO df(term, doc_freq) VALUES (?1, ?2)")?;
        for (term, count) in df {
            stmt.execute(params![term, count])?;
        }
        Ok(())
    }

    pub fn insert_link(&self, from: DocId, to: DocId) -> Result<()> {
        self.tx
            .prepare_cached("INSERT INTO links(from_doc_id, to_doc_id) VALUES (?1, ?2)")?
            .execute(params![from, to])?;
        Ok(())
    }

    pub fn set_corpus_stats(&self, stats: &CorpusStats) -> Result<()> {
        let mut stmt = self.tx.prepare_cached("INSERT OR REPLACE INTO meta(key, value) VALUES (?1, ?2)")?;
        stmt.execute(params![META_NUM_DOCS, f64::from(stats.num_docs)])?;
        stmt.execute(params![META_AVGDL, stats.avgdl])?;
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit().context("committing index rebuild")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: DocId, url: &str) -> DocRecord {
        DocRecord { doc_id: id, url: url.into(), title: format!("t{id}"), path: format!("/raw/{id}.txt"), length: 4 }
    }

    #[test]
    fn rebuild_is_invisible_until_commit() {
        let mut store = IndexStore::open_in_memory().unwrap();
        {
            let rb = store.rebuild().unwrap();
            rb.insert_document(&doc(1, "http://a.com/")).unwrap();
            // dropped without commit: rolled back
        }
        assert!(store.documents().unwrap().is_empty());

        let rb = store.rebuild().unwrap();
        rb.insert_document(&doc(1, "http://a.com/")).unwrap();
        rb.insert_document(&doc(2, "http://a.com/b")).unwrap();
        rb.insert_link(1, 2).unwrap();
        rb.set_corpus_stats(&CorpusStats { num_docs: 2, avgdl: 4.0 }).unwrap();
        rb.commit().unwrap();

        assert_eq!(store.documents().unwrap().len(), 2);
        assert_eq!(store.corpus_stats().unwrap(), CorpusStats { num_docs: 2, avgdl: 4.0 });
        let graph = store.load_graph().unwrap();
        assert_eq!(graph[&1], vec![2]);
        assert!(graph[&2].is_empty());
    }

    #[test]
    fn duplicate_urls_are_rejected() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let rb = store.rebuild().unwrap();
        rb.insert_document(&doc(1, "http://a.com/")).unwrap();
        assert!(rb.insert_document(&doc(2, "http://a.com/")).is_err());
    }

    #[test]
    fn pagerank_is_upserted() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let rb = store.rebuild().unwrap();
        rb.insert_document(&doc(1, "http://a.com/")).unwrap();
        rb.commit().unwrap();

        assert_eq!(store.max_pagerank().unwrap(), None);
        store.save_pagerank(&BTreeMap::from([(1, 0.5)])).unwrap();
        store.save_pagerank(&BTreeMap::from([(1, 0.25)])).unwrap();
        assert_eq!(store.pagerank(1).unwrap(), Some(0.25));
        assert_eq!(store.max_pagerank().unwrap(), Some(0.25));
        assert_eq!(store.pagerank(2).unwrap(), None);
    }
}
