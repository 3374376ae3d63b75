//! Prompt templates for recipe and image generation.

use crate::cocktail_model::{
    BaseSpirit, Carbonation, CocktailColor, GlassType, IngredientCategory, Technique, Temperature,
};

/// Sentinel object the model returns for cocktails it has no information about
pub const UNKNOWN_COCKTAIL_SENTINEL: &str = "unknown_cocktail";

fn enum_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// JSON schema describing the expected recipe payload, built from the closed sets
pub fn recipe_json_schema() -> String {
    let bases: Vec<&str> = BaseSpirit::ALL.iter().map(|v| v.as_str()).collect();
    let techniques: Vec<&str> = Technique::ALL.iter().map(|v| v.as_str()).collect();
    let glasses: Vec<&str> = GlassType::ALL.iter().map(|v| v.as_str()).collect();
    let temperatures: Vec<&str> = Temperature::ALL.iter().map(|v| v.as_str()).collect();
    let carbonations: Vec<&str> = Carbonation::ALL.iter().map(|v| v.as_str()).collect();
    let colors: Vec<&str> = CocktailColor::ALL.iter().map(|v| v.as_str()).collect();
    let categories: Vec<&str> = IngredientCategory::ALL.iter().map(|v| v.as_str()).collect();

    format!(
        r#"{{
  "type": "object",
  "properties": {{
    "name": {{ "type": "string", "description": "Cocktail name in Japanese" }},
    "name_en": {{ "type": ["string", "null"], "description": "English name" }},
    "name_alias": {{ "type": ["string", "null"], "description": "Alias" }},
    "slug": {{ "type": "string", "description": "URL slug (lowercase ASCII, hyphen separated)" }},
    "description": {{
      "type": ["string", "null"], "description": "Description, origin and history"
    }},
    "cocktail_word": {{
      "type": ["string", "null"], "description": "Cocktail word (symbolic meaning)"
    }},
    "base": {{ "type": "string", "enum": [{bases}] }},
    "technique": {{ "type": "string", "enum": [{techniques}] }},
    "glass": {{ "type": "string", "enum": [{glasses}] }},
    "alcohol_percentage": {{ "type": "integer", "minimum": 0, "maximum": 100 }},
    "temperature": {{ "type": "string", "enum": [{temperatures}] }},
    "carbonation": {{ "type": "string", "enum": [{carbonations}] }},
    "color": {{ "type": ["string", "null"], "enum": [{colors}, null] }},
    "variation_text": {{
      "type": ["string", "null"], "description": "Variations, comma separated"
    }},
    "ingredients": {{
      "type": "array",
      "items": {{
        "type": "object",
        "properties": {{
          "name": {{ "type": "string", "description": "Generic ingredient name in Japanese" }},
          "name_en": {{ "type": ["string", "null"], "description": "English name" }},
          "category": {{ "type": ["string", "null"], "enum": [{categories}, null] }},
          "amount": {{ "type": ["string", "null"], "description": "Amount (30ml, 適量, ...)" }}
        }},
        "required": ["name"]
      }}
    }}
  }},
  "required": [
    "name", "slug", "base", "technique", "glass", "alcohol_percentage", "temperature",
    "carbonation", "ingredients"
  ]
}}"#,
        bases = enum_list(&bases),
        techniques = enum_list(&techniques),
        glasses = enum_list(&glasses),
        temperatures = enum_list(&temperatures),
        carbonations = enum_list(&carbonations),
        colors = enum_list(&colors),
        categories = enum_list(&categories),
    )
}

/// Prompt asking for the recipe of `cocktail_name`.
///
/// When `existing_ingredients` is non-empty the model is asked to reuse those
/// spellings, which raises the exact-match rate of the matcher.
pub fn build_recipe_prompt(cocktail_name: &str, existing_ingredients: &[String]) -> String {
    let ingredient_section = if existing_ingredients.is_empty() {
        String::new()
    } else {
        format!(
            "\n[Existing ingredients]\n\
             The following ingredient names are already registered. \
             Pick names from this list whenever possible \
             and only use a new name for ingredients that are not in it.\n\n{}\n",
            existing_ingredients.join(", ")
        )
    };

    format!(
        "You are a professional bartender.\n\
         Return the recipe information for the cocktail below as JSON.\n\n\
         [Rules]\n\
         - Only include information you are certain of; never guess or invent\n\
         - Use null for any field you do not know\n\
         - Only use the allowed values for each field\n\
         - Use generic ingredient names, not brand names\n\
         - Write `name` fields in Japanese and `name_en` fields in English\n\
         - If you have no information about this cocktail, return {{\"error\": \"{sentinel}\"}}\n\
         {ingredient_section}\n\
         [Cocktail name]\n\
         {cocktail_name}\n\n\
         [Response format]\n\
         Follow this JSON Schema:\n\
         {schema}\n\n\
         Return only the JSON, without any explanation.",
        sentinel = UNKNOWN_COCKTAIL_SENTINEL,
        schema = recipe_json_schema(),
    )
}

/// Prompt for a product-style photo of the cocktail
pub fn build_image_prompt(name: &str, glass: GlassType, color: Option<CocktailColor>) -> String {
    let color = color.map(|c| c.as_str()).unwrap_or("natural");

    format!(
        "A photorealistic product photography of \"{name}\" cocktail.\n\n\
         Glass type: {glass} glass\n\
         Cocktail color: {color}\n\
         Style: Professional studio photography with soft lighting\n\
         Background: Clean, minimalist bar counter with subtle bokeh\n\
         Angle: Slightly elevated 45-degree angle\n\
         Details: Condensation on glass, appropriate garnish if applicable\n\
         Quality: High resolution, sharp focus on the cocktail\n\n\
         Do not include any text or labels in the image.",
        glass = glass.as_str().replace('_', " "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_valid_json_with_all_enums() {
        let schema: serde_json::Value = serde_json::from_str(&recipe_json_schema()).unwrap();
        let glass = schema["properties"]["glass"]["enum"].as_array().unwrap();
        assert_eq!(glass.len(), GlassType::ALL.len());
        let color = schema["properties"]["color"]["enum"].as_array().unwrap();
        assert_eq!(color.len(), CocktailColor::ALL.len() + 1);
        assert!(color.last().unwrap().is_null());
    }

    #[test]
    fn test_recipe_prompt_without_catalog() {
        let prompt = build_recipe_prompt("マティーニ", &[]);
        assert!(prompt.contains("マティーニ"));
        assert!(prompt.contains("{\"error\": \"unknown_cocktail\"}"));
        assert!(!prompt.contains("[Existing ingredients]"));
    }

    #[test]
    fn test_recipe_prompt_lists_catalog_names() {
        let names = vec!["ジン".to_string(), "ドライベルモット".to_string()];
        let prompt = build_recipe_prompt("マティーニ", &names);
        assert!(prompt.contains("[Existing ingredients]"));
        assert!(prompt.contains("ジン, ドライベルモット"));
    }

    #[test]
    fn test_image_prompt() {
        let prompt =
            build_image_prompt("Moscow Mule", GlassType::CopperMug, Some(CocktailColor::Amber));
        assert!(prompt.contains("\"Moscow Mule\""));
        assert!(prompt.contains("Glass type: copper mug glass"));
        assert!(prompt.contains("Cocktail color: amber"));

        let prompt = build_image_prompt("Gin Fizz", GlassType::Collins, None);
        assert!(prompt.contains("Cocktail color: natural"));
    }
}
