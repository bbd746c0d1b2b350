use crate::codec::EncodedBatch;

/// Build the single prompt sent for one batch
pub fn build_translation_prompt(
    source_language: &str,
    target_language: &str,
    batch: &EncodedBatch,
) -> String {
    format!(
        "You are a professional subtitle translator.\n\
         \n\
         Translate the {source} subtitle lines below into {target}.\n\
         \n\
         RULES:\n\
         1. Every line starts with a timestamp range in square brackets. Copy it unchanged to the start of the translated line.\n\
         2. Never merge the text of two lines and never split one line into several.\n\
         3. Return exactly {count} lines, one translated line for each line you received.\n\
         4. Be concise. Do not add explanations, notes or anything else.\n\
         \n\
         [Lines to translate into {target}]\n\
         {text}\n",
        source = source_language,
        target = target_language,
        count = batch.line_count,
        text = batch.text,
    )
}
