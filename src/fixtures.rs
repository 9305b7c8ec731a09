#[cfg(test)]
pub mod test {
    use std::collections::{BTreeMap, HashMap};

    use serde::{Deserialize, Serialize};

    use crate::error::YamlfigError;
    use crate::shape::{Shape, ShapeNode};
    use crate::template::{Template, Templater};
    use crate::Config;

    // -- Nested loader fixtures -------------------------------------------------

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Level3 {
        pub level3text: String,
        pub nullstring: Option<String>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Level2 {
        pub level2text: String,
        pub level3: Level3,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct CfgStruct {
        pub level1text: String,
        pub level2: Level2,
        pub mapfield: HashMap<String, Level2>,
        pub map2: HashMap<String, Level3>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct EmbeddedStruct {
        #[serde(flatten)]
        pub base: CfgStruct,
        pub level4: String,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct FlatMap {
        pub name: String,
        #[serde(flatten)]
        pub extra: HashMap<String, String>,
    }

    // -- Map fixtures -----------------------------------------------------------

    #[derive(
        Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
    )]
    pub struct MapValue {
        pub name: String,
        pub num: i64,
        pub flag: bool,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct OneMap {
        pub one: HashMap<String, MapValue>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct TwoMaps {
        pub one: HashMap<String, MapValue>,
        pub two: HashMap<String, MapValue>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct StringMap {
        pub one: HashMap<String, String>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct WithMap {
        pub inner: HashMap<String, String>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct MapStructMap {
        pub one: HashMap<String, WithMap>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct IntKeyMap {
        pub one: HashMap<i64, MapValue>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    #[config(custom_template)]
    pub struct StructKeyMap {
        pub one: BTreeMap<MapValue, String>,
    }

    // -- Typed scalar fixtures --------------------------------------------------

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Pooled {
        pub pool_size: u32,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct MaybeNested {
        pub inner: Option<Level3>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Typed {
        pub port: u16,
        pub ratio: f64,
        pub enabled: bool,
        pub tags: Vec<String>,
        pub pair: [u8; 2],
        pub limit: Option<u32>,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Credentials {
        pub user: String,
        /// Database password.
        #[config(secret)]
        pub password: String,
    }

    // -- Template fixtures ------------------------------------------------------

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Inner {
        /// First inner field
        pub f1: String,
        /// Second inner field
        pub f2: String,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Sample {
        /// Example secret value
        #[config(secret)]
        pub simple: String,
        /// List
        pub list: Vec<String>,
        /// Map
        pub map: HashMap<String, String>,
        /// List of structs
        #[serde(rename = "listOfStruct")]
        pub list_of_struct: Vec<Inner>,
        /// Map of structs
        #[serde(rename = "mapOfStruct")]
        pub map_of_struct: HashMap<String, Inner>,
        pub inner: Inner,
    }

    fn inner(f1: &str, f2: &str) -> Inner {
        Inner {
            f1: f1.into(),
            f2: f2.into(),
        }
    }

    pub fn sample() -> Sample {
        Sample {
            simple: "example".into(),
            list: vec!["val1".into(), "val2".into(), "val3".into()],
            map: [("key1", "value1"), ("key2", "value2"), ("key3", "value3")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            list_of_struct: vec![
                inner("firstValue", "secondValue"),
                inner("value1", "value2"),
            ],
            map_of_struct: HashMap::from([
                ("key1".to_string(), inner("value1", "value2")),
                ("key2".to_string(), inner("value3", "value4")),
            ]),
            inner: inner("innerField1", "innerField2"),
        }
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Defaulted {
        /// Listen port
        #[config(default = 8080)]
        pub port: u16,
        #[config(comment = "Display name")]
        pub name: String,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Mode {
        #[default]
        Fast,
        Slow,
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct WithLeaf {
        #[config(leaf)]
        pub mode: Mode,
        #[config(leaf)]
        pub pairs: Option<Vec<(String, u8)>>,
    }

    /// A value whose template always fails.
    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct Broken;

    impl Shape for Broken {
        fn shape() -> ShapeNode {
            ShapeNode::opaque::<Broken>()
        }
    }

    impl Template for Broken {
        fn template_to(&self, _t: &mut Templater<'_>) -> Result<(), YamlfigError> {
            Err(YamlfigError::Template("cannot render Broken".into()))
        }
    }

    #[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct WithBroken {
        pub broken: Broken,
    }
}
