use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER: &str = "scholar_text";

pub const KIND_DOCUMENT: &str = "document";
pub const KIND_CHUNK: &str = "chunk";

/// Fast field holding days since the common era; undated records get `UNDATED`.
pub const PUBLISHED: &str = "published";
pub const UNDATED: i64 = i64::MIN;

/// Handles to every schema field, resolved once per index.
#[derive(Clone, Copy)]
pub struct Fields {
	pub key: Field,
	pub kind: Field,
	pub document_id: Field,
	pub chunk_index: Field,
	pub title: Field,
	pub abstract_text: Field,
	pub authors: Field,
	pub text: Field,
	pub section: Field,
	pub categories: Field,
	pub year: Field,
	pub published: Field,
	pub doc_json: Field,
}

impl Fields {
	pub fn resolve(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			key: schema.get_field("key")?,
			kind: schema.get_field("kind")?,
			document_id: schema.get_field("document_id")?,
			chunk_index: schema.get_field("chunk_index")?,
			title: schema.get_field("title")?,
			abstract_text: schema.get_field("abstract")?,
			authors: schema.get_field("authors")?,
			text: schema.get_field("text")?,
			section: schema.get_field("section")?,
			categories: schema.get_field("categories")?,
			year: schema.get_field("year")?,
			published: schema.get_field(PUBLISHED)?,
			doc_json: schema.get_field("doc_json")?,
		})
	}
}

/// Searchable fields are tokenized with stop words removed; `categories` is
/// raw so filters match exactly; the paper record rides along as JSON.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("key", STRING | STORED);
	schema_builder.add_text_field("kind", STRING | STORED);
	schema_builder.add_text_field("document_id", STRING | STORED);
	schema_builder.add_u64_field("chunk_index", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let indexed = TextOptions::default().set_indexing_options(text_field_indexing);
	let indexed_stored = indexed.clone().set_stored();
	schema_builder.add_text_field("title", indexed.clone());
	schema_builder.add_text_field("abstract", indexed.clone());
	schema_builder.add_text_field("authors", indexed);
	schema_builder.add_text_field("text", indexed_stored.clone());
	schema_builder.add_text_field("section", indexed_stored);
	schema_builder.add_text_field("categories", STRING | STORED);
	schema_builder.add_i64_field("year", INDEXED | STORED | FAST);
	schema_builder.add_i64_field(PUBLISHED, FAST);
	schema_builder.add_text_field("doc_json", STORED);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}
