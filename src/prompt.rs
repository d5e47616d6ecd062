use crate::models::{GenerationRequest, ProductRecord};

/// Role-turn delimiters the completion endpoint expects around the blob.
pub const HUMAN_TURN: &str = "\n\nHuman:";
pub const ASSISTANT_TURN: &str = "\n\nAssistant:";

const PRODUCT_MAX_TOKENS: u32 = 500;
const CATEGORY_MAX_TOKENS: u32 = 1500;

/// At most this many representative products are summarized in a category
/// prompt, each with the description cut to `SUMMARY_DESCRIPTION_CHARS`.
const SUMMARY_CAP: usize = 5;
const SUMMARY_DESCRIPTION_CHARS: usize = 100;

/// Renders the per-product template. Empty variant or metafield lists join to
/// nothing; the section headers stay in place.
pub fn product_post(record: &ProductRecord) -> GenerationRequest {
    let variant_lines = record
        .variants
        .iter()
        .map(|variant| format!("- {}: ${}", variant.title, variant.price))
        .collect::<Vec<_>>()
        .join("\n");
    let metafield_lines = record
        .metafields
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "{HUMAN_TURN} Write a 300-word blog post for an e-commerce website about the following product:\n\
         \n\
         Title: {title}\n\
         Description: {description}\n\
         \n\
         Variants:\n\
         {variant_lines}\n\
         \n\
         Additional Information:\n\
         {metafield_lines}\n\
         \n\
         The blog post should:\n\
         1. Introduce the product\n\
         2. Highlight its key features and benefits\n\
         3. Mention any variants or options available\n\
         4. Use the additional information to provide more context or details\n\
         5. Suggest potential use cases\n\
         6. Include a call-to-action to purchase the product\n\
         \n\
         Please write in a friendly, engaging tone suitable for an e-commerce blog.{ASSISTANT_TURN}",
        title = record.title,
        description = record.description,
    );

    GenerationRequest {
        subject: record.title.clone(),
        prompt,
        max_tokens: PRODUCT_MAX_TOKENS,
    }
}

/// Renders the per-category template over a matched set of records.
pub fn category_post(category: &str, records: &[ProductRecord]) -> GenerationRequest {
    let summaries = records
        .iter()
        .take(SUMMARY_CAP)
        .map(|record| {
            format!(
                "- {}: {}",
                record.title,
                truncate(&record.description, SUMMARY_DESCRIPTION_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "{HUMAN_TURN} Write a 1000-word blog post about {category} for an e-commerce website. Include the following:\n\
         \n\
         1. An engaging introduction to {category} and why they matter to shoppers today\n\
         2. Key features and benefits of {category}, explaining why they are essential for certain needs or use cases\n\
         3. Highlight these top products from our range, explaining what makes each unique:\n\
         {summaries}\n\
         4. Provide a detailed guide on how to choose the right {category} for different needs\n\
         5. Discuss any relevant standards or certifications that customers should look for\n\
         6. Include tips for proper use and care of {category}\n\
         7. Address common questions or misconceptions about {category}\n\
         8. Conclude with a strong call-to-action encouraging readers to explore our full range of {category}\n\
         \n\
         Please write in a friendly, engaging, and authoritative tone suitable for an e-commerce blog. \
         Use appropriate subheadings to structure the content.{ASSISTANT_TURN}"
    );

    GenerationRequest {
        subject: category.to_string(),
        prompt,
        max_tokens: CATEGORY_MAX_TOKENS,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Variant;
    use std::collections::BTreeMap;

    fn sample_record() -> ProductRecord {
        ProductRecord {
            id: 1,
            title: "Steel Water Bottle".to_string(),
            description: "Keeps drinks cold & fresh all day.".to_string(),
            product_type: Some("Drinkware".to_string()),
            tags: None,
            variants: vec![
                Variant {
                    title: "500ml".to_string(),
                    price: "19.99".to_string(),
                },
                Variant {
                    title: "750ml".to_string(),
                    price: "24.99".to_string(),
                },
            ],
            metafields: BTreeMap::new(),
            images: Vec::new(),
        }
    }

    #[test]
    fn product_prompt_embeds_title_variants_and_delimiters() {
        let request = product_post(&sample_record());
        assert_eq!(request.subject, "Steel Water Bottle");
        assert_eq!(request.max_tokens, 500);
        assert!(request.prompt.starts_with(HUMAN_TURN));
        assert!(request.prompt.ends_with(ASSISTANT_TURN));
        assert!(request.prompt.contains("Title: Steel Water Bottle"));
        assert!(request.prompt.contains("- 500ml: $19.99"));
        assert!(request.prompt.contains("- 750ml: $24.99"));
    }

    #[test]
    fn empty_metafields_degrade_to_nothing() {
        let request = product_post(&sample_record());
        // The section header sits directly against the next section; no
        // placeholder text appears.
        assert!(
            request
                .prompt
                .contains("Additional Information:\n\n\nThe blog post should:")
        );
        assert!(!request.prompt.contains("None"));
    }

    #[test]
    fn metafield_lines_render_as_key_value() {
        let mut record = sample_record();
        record
            .metafields
            .insert("material".to_string(), "stainless steel".to_string());
        let request = product_post(&record);
        assert!(request.prompt.contains("material: stainless steel"));
    }

    #[test]
    fn unescaped_description_flows_into_prompt() {
        let request = product_post(&sample_record());
        assert!(request.prompt.contains("cold & fresh"));
        assert!(!request.prompt.contains("&amp;"));
    }

    #[test]
    fn category_prompt_caps_summaries_and_truncates_descriptions() {
        let mut records = Vec::new();
        for index in 0..7 {
            let mut record = sample_record();
            record.title = format!("Bottle {index}");
            record.description = "x".repeat(150);
            records.push(record);
        }
        let request = category_post("drinkware", &records);
        assert_eq!(request.max_tokens, 1500);
        for index in 0..5 {
            assert!(request.prompt.contains(&format!("- Bottle {index}:")));
        }
        assert!(!request.prompt.contains("- Bottle 5:"));
        assert!(!request.prompt.contains("- Bottle 6:"));
        let truncated = format!("{}...", "x".repeat(100));
        assert!(request.prompt.contains(&truncated));
        assert!(!request.prompt.contains(&"x".repeat(101)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 100), "héllo wörld");
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }
}
