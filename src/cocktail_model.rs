//! # Cocktail and Ingredient Data Model
//!
//! This module defines the records that flow through the recipe import pipeline:
//! ingredient mentions returned by the AI, catalog ingredients persisted in the
//! database, and the recipe lines that bind the two together.
//!
//! ## Core Concepts
//!
//! - **Mention**: a single ingredient reference as returned by the AI
//! - **Catalog ingredient**: an authoritative, persisted ingredient record
//! - **Recipe line**: one ingredient + amount + position in a cocktail's recipe
//! - **Closed sets**: base spirit, technique, glass, temperature, carbonation,
//!   color and ingredient category only accept a fixed list of wire values
//!
//! ## Usage
//!
//! ```rust
//! use cocktail_catalog::cocktail_model::{IngredientCategory, IngredientMention};
//!
//! let gin = IngredientMention::new("ジン")
//!     .with_name_alt("Gin")
//!     .with_category(IngredientCategory::Spirits)
//!     .with_amount("45ml");
//! assert_eq!(gin.amount.as_deref(), Some("45ml"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a closed set of wire values with a display label for each one.
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => ($wire:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every value of the set, in display order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value stored in the database and exchanged with the AI
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Japanese label shown to catalog users
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Parse a stored wire value
            pub fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_set! {
    /// Base spirit of a cocktail
    BaseSpirit {
        Gin => ("gin", "ジン"),
        Vodka => ("vodka", "ウォッカ"),
        Rum => ("rum", "ラム"),
        Tequila => ("tequila", "テキーラ"),
        Whiskey => ("whiskey", "ウイスキー"),
        Brandy => ("brandy", "ブランデー"),
        Liqueur => ("liqueur", "リキュール"),
        Wine => ("wine", "ワイン"),
        Beer => ("beer", "ビール"),
        NonAlcoholic => ("non_alcoholic", "ノンアルコール"),
        Other => ("other", "その他"),
    }
}

closed_set! {
    /// Mixing technique
    Technique {
        Shake => ("shake", "シェイク"),
        Stir => ("stir", "ステア"),
        Build => ("build", "ビルド"),
        Blend => ("blend", "ブレンド"),
    }
}

closed_set! {
    /// Serving glass
    GlassType {
        Cocktail => ("cocktail", "カクテルグラス"),
        Rocks => ("rocks", "ロックグラス"),
        Highball => ("highball", "ハイボールグラス"),
        Collins => ("collins", "コリンズグラス"),
        ChampagneFlute => ("champagne_flute", "シャンパンフルート"),
        ChampagneSaucer => ("champagne_saucer", "シャンパンソーサー"),
        Wine => ("wine", "ワイングラス"),
        Shot => ("shot", "ショットグラス"),
        CopperMug => ("copper_mug", "銅マグ"),
        Goblet => ("goblet", "ゴブレット"),
        Other => ("other", "その他"),
    }
}

closed_set! {
    /// Serving temperature
    Temperature {
        Ice => ("ice", "アイス"),
        Hot => ("hot", "ホット"),
        CrushedIce => ("crushed_ice", "クラッシュアイス"),
        Frozen => ("frozen", "フローズン"),
    }
}

closed_set! {
    /// Carbonation level
    Carbonation {
        Strong => ("strong", "強"),
        Weak => ("weak", "弱"),
        None => ("none", "無"),
    }
}

closed_set! {
    /// Dominant color of the drink
    CocktailColor {
        Red => ("red", "赤"),
        Orange => ("orange", "オレンジ"),
        Yellow => ("yellow", "黄"),
        Green => ("green", "緑"),
        Blue => ("blue", "青"),
        Purple => ("purple", "紫"),
        Pink => ("pink", "ピンク"),
        Brown => ("brown", "茶"),
        Amber => ("amber", "琥珀"),
        White => ("white", "白"),
        Clear => ("clear", "透明"),
        Layered => ("layered", "レイヤー（多層）"),
    }
}

closed_set! {
    /// Ingredient category used by the catalog and the search filters
    IngredientCategory {
        Spirits => ("spirits", "スピリッツ"),
        Liqueur => ("liqueur", "リキュール"),
        Wine => ("wine", "ワイン・シャンパン"),
        Juice => ("juice", "ジュース"),
        Soda => ("soda", "ソーダ・炭酸"),
        Syrup => ("syrup", "シロップ"),
        Dairy => ("dairy", "乳製品"),
        Fruit => ("fruit", "フルーツ"),
        Herb => ("herb", "ハーブ・スパイス"),
        Other => ("other", "その他"),
    }
}

closed_set! {
    /// Alcohol strength bucket used by search; never stored, always derived
    AlcoholStrength {
        None => ("none", "無"),
        Low => ("low", "弱"),
        Medium => ("medium", "中"),
        High => ("high", "高"),
    }
}

impl AlcoholStrength {
    /// Bucket an alcohol percentage (0 = none, 1-10 low, 11-20 medium, 21+ high)
    pub fn from_percentage(percentage: u8) -> Self {
        match percentage {
            0 => AlcoholStrength::None,
            1..=10 => AlcoholStrength::Low,
            11..=20 => AlcoholStrength::Medium,
            _ => AlcoholStrength::High,
        }
    }

    /// Inclusive percentage range covered by the bucket
    pub fn range(&self) -> (u8, u8) {
        match self {
            AlcoholStrength::None => (0, 0),
            AlcoholStrength::Low => (1, 10),
            AlcoholStrength::Medium => (11, 20),
            AlcoholStrength::High => (21, 100),
        }
    }
}

/// A single ingredient reference as returned by the AI, before reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientMention {
    /// Display name in the catalog's primary language (e.g. "ジン")
    pub name: String,

    /// Alternate-language name, used as the secondary match key
    #[serde(rename = "name_en", default)]
    pub name_alt: Option<String>,

    #[serde(default)]
    pub category: Option<IngredientCategory>,

    /// Free-text quantity ("30ml", "適量"); opaque to the pipeline
    #[serde(default)]
    pub amount: Option<String>,
}

impl IngredientMention {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            name_alt: None,
            category: None,
            amount: None,
        }
    }

    pub fn with_name_alt(mut self, name_alt: &str) -> Self {
        self.name_alt = Some(name_alt.to_string());
        self
    }

    pub fn with_category(mut self, category: IngredientCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_amount(mut self, amount: &str) -> Self {
        self.amount = Some(amount.to_string());
        self
    }
}

impl fmt::Display for IngredientMention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.amount {
            Some(amount) => write!(f, "{} {}", self.name, amount),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Persisted, authoritative ingredient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogIngredient {
    /// Opaque unique identifier
    pub id: String,

    /// Unique within the catalog; primary match key
    pub name: String,

    /// Secondary match key, compared lowercased
    #[serde(rename = "name_en")]
    pub name_alt: Option<String>,

    pub category: Option<IngredientCategory>,

    /// Whether the ingredient is offered in end-user search filters
    pub is_searchable: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogIngredient {
    /// Build a fresh, not-yet-searchable entry with a generated id
    pub fn new(name: &str, name_alt: Option<&str>, category: Option<IngredientCategory>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            name_alt: name_alt.map(str::to_string),
            category,
            is_searchable: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Full recipe payload returned by the AI for one cocktail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocktailRecipe {
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub name_alias: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cocktail_word: Option<String>,
    pub base: BaseSpirit,
    pub technique: Technique,
    pub glass: GlassType,
    /// Estimated ABV, 0..=100
    pub alcohol_percentage: u8,
    pub temperature: Temperature,
    pub carbonation: Carbonation,
    #[serde(default)]
    pub color: Option<CocktailColor>,
    /// Comma-separated names of derived cocktails
    #[serde(default)]
    pub variation_text: Option<String>,
    pub ingredients: Vec<IngredientMention>,
}

impl CocktailRecipe {
    pub fn alcohol_strength(&self) -> AlcoholStrength {
        AlcoholStrength::from_percentage(self.alcohol_percentage)
    }

    /// Variation names split out of `variation_text`, blanks dropped
    pub fn variations(&self) -> Vec<&str> {
        self.variation_text
            .as_deref()
            .map(|text| {
                text.split([',', '、'])
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One ingredient + amount + display position in a cocktail's persisted recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: String,
    pub amount: Option<String>,
    /// 0-based, dense across all lines of one recipe
    pub sort_order: i32,
}

impl RecipeLine {
    pub fn new(ingredient_id: &str, amount: Option<&str>, sort_order: i32) -> Self {
        Self {
            ingredient_id: ingredient_id.to_string(),
            amount: amount.map(str::to_string),
            sort_order,
        }
    }
}
