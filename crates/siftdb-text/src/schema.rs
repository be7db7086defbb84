//! Tantivy schema and analyzer shared by every collection.

use tantivy::schema::{
    IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use siftdb_core::stopwords::STOPWORDS;

pub const TOKENIZER_NAME: &str = "text_with_stopwords";

/// Two ranked fields: the full chunk text and the extracted keywords. The
/// keywords field is queried with a higher boost since it is a denser
/// relevance signal.
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let _id_field = schema_builder.add_text_field("id", STRING | STORED);
    let _doc_id_field = schema_builder.add_text_field("doc_id", STRING | STORED);
    let _section_field = schema_builder.add_text_field("section", STRING | STORED);
    let _page_field = schema_builder.add_u64_field("page", STORED);
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(indexing.clone()).set_stored();
    let _text_field = schema_builder.add_text_field("text", text_options);
    let keywords_options = TextOptions::default().set_indexing_options(indexing);
    let _keywords_field = schema_builder.add_text_field("keywords", keywords_options);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(STOPWORDS.iter().map(|s| (*s).to_string())))
        .build();
    index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}
