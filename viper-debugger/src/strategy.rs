// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    errors::{SessionError, SessionResult},
    types::{TypeCache, ViperType},
};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use viper_model::{Model, ModelEntry, VerificationBackend};

static SILICON_DECORATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)@\d+@\d+$").unwrap());
static SILICON_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)!val!\d+$").unwrap());

/// The backend-specific part of model interpretation.
///
/// Selected once at session construction; the rest of the pipeline is
/// backend-agnostic and goes through this interface.
pub trait BackendStrategy {
    fn backend(&self) -> VerificationBackend;

    /// The canonical name of the null reference in this backend's models.
    fn null_ref_name(&self) -> &'static str;

    /// Strips the backend's state decoration from a model symbol, yielding
    /// the source-level name it was derived from.
    fn strip_decoration<'a>(&self, symbol: &'a str) -> &'a str;

    /// Whether the model entry denotes a program state.
    fn is_state_entry(&self, name: &str, entry: &ModelEntry) -> bool;

    /// The name of the model relation encoding lookups of the given field.
    fn field_lookup_relation(&self, field: &str) -> String;

    /// The extra lookup argument identifying the field, for backends that
    /// encode all fields through one relation.
    fn field_tag(&self, model: &Model, field: &str) -> SessionResult<Option<String>>;

    /// Classifies a model value, consulting the backend's value encoding.
    /// Referentially stable: the same value always yields the same
    /// (pointer-equal) type within one session.
    fn type_of_value(&mut self, value: &str) -> Rc<ViperType>;
}

/// Builds the strategy for the given backend over the given model.
pub fn strategy_for(
    backend: VerificationBackend,
    model: &Model,
    cache: &mut TypeCache,
) -> SessionResult<Box<dyn BackendStrategy>> {
    match backend {
        VerificationBackend::Silicon => Ok(Box::new(SiliconStrategy::new(cache))),
        VerificationBackend::Carbon => Ok(Box::new(CarbonStrategy::new(model)?)),
    }
}

/// Silicon encodes values as SMT literals: uninterpreted values as
/// `<sort>!val!<n>`, permissions as fractional numbers, and one field-value
/// function per field.
pub struct SiliconStrategy {
    int_type: Rc<ViperType>,
    perm_type: Rc<ViperType>,
    types: FxHashMap<String, Rc<ViperType>>,
}

impl SiliconStrategy {
    pub fn new(cache: &mut TypeCache) -> Self {
        let mut types = FxHashMap::default();
        let bool_type = cache.resolve("Bool");
        types.insert("true".to_string(), Rc::clone(&bool_type));
        types.insert("false".to_string(), bool_type);
        types.insert("$Snap.unit".to_string(), cache.resolve("$Snap.unit"));
        types.insert("$Ref".to_string(), cache.resolve("Ref"));
        types.insert("Set<$Ref>".to_string(), cache.resolve("Set[Ref]"));
        SiliconStrategy {
            int_type: cache.resolve("Int"),
            perm_type: cache.resolve("Perm"),
            types,
        }
    }
}

impl BackendStrategy for SiliconStrategy {
    fn backend(&self) -> VerificationBackend {
        VerificationBackend::Silicon
    }

    fn null_ref_name(&self) -> &'static str {
        "$Ref.null"
    }

    fn strip_decoration<'a>(&self, symbol: &'a str) -> &'a str {
        match SILICON_DECORATION.captures(symbol) {
            Some(captures) => captures.get(1).unwrap().as_str(),
            None => symbol,
        }
    }

    fn is_state_entry(&self, _name: &str, entry: &ModelEntry) -> bool {
        matches!(entry, ModelEntry::Constant { value, .. } if value.starts_with("$FVF<"))
    }

    fn field_lookup_relation(&self, field: &str) -> String {
        format!("$FVF.lookup_{field}")
    }

    fn field_tag(&self, _model: &Model, _field: &str) -> SessionResult<Option<String>> {
        Ok(None)
    }

    fn type_of_value(&mut self, value: &str) -> Rc<ViperType> {
        if let Some(typ) = self.types.get(value) {
            return Rc::clone(typ);
        }
        if value.parse::<i64>().is_ok() {
            let typ = Rc::clone(&self.int_type);
            self.types.insert(value.to_string(), Rc::clone(&typ));
            return typ;
        }
        if value.parse::<f64>().is_ok() {
            let typ = Rc::clone(&self.perm_type);
            self.types.insert(value.to_string(), Rc::clone(&typ));
            return typ;
        }
        if let Some(captures) = SILICON_VALUE.captures(value) {
            let sort_name = captures.get(1).unwrap().as_str();
            if let Some(typ) = self.types.get(sort_name) {
                return Rc::clone(typ);
            }
            let typ = Rc::new(ViperType::Other {
                name: sort_name.to_string(),
                inner: None,
            });
            self.types.insert(sort_name.to_string(), Rc::clone(&typ));
            return typ;
        }
        warn!("cannot deduce value type for '{value}'; treating it as opaque");
        let typ = Rc::new(ViperType::Other {
            name: value.to_string(),
            inner: Some(value.to_string()),
        });
        self.types.insert(value.to_string(), Rc::clone(&typ));
        typ
    }
}

/// Carbon keeps an explicit `type` relation in the model, tagging every value
/// with one of the well-known type constants.
pub struct CarbonStrategy {
    type_relation: Option<ModelEntry>,
    types: FxHashMap<String, Rc<ViperType>>,
}

impl CarbonStrategy {
    pub fn new(model: &Model) -> SessionResult<Self> {
        let mut types = FxHashMap::default();
        let seeds: [(&str, fn(Option<String>) -> ViperType); 4] = [
            ("RefType", |inner| ViperType::Ref { inner }),
            ("boolType", |inner| ViperType::Bool { inner }),
            ("intType", |inner| ViperType::Int { inner }),
            ("permType", |inner| ViperType::Perm { inner }),
        ];
        for (symbol, make) in seeds {
            match model.get(symbol) {
                Some(entry) => {
                    let tag = entry.constant_value()?.to_string();
                    types.insert(tag.clone(), Rc::new(make(Some(tag))));
                }
                None => warn!("model has no '{symbol}' constant; its values will be untagged"),
            }
        }
        Ok(CarbonStrategy {
            type_relation: model.get("type").cloned(),
            types,
        })
    }
}

impl BackendStrategy for CarbonStrategy {
    fn backend(&self) -> VerificationBackend {
        VerificationBackend::Carbon
    }

    fn null_ref_name(&self) -> &'static str {
        "null"
    }

    fn strip_decoration<'a>(&self, symbol: &'a str) -> &'a str {
        symbol
    }

    fn is_state_entry(&self, name: &str, entry: &ModelEntry) -> bool {
        name.starts_with("Heap@@") && matches!(entry, ModelEntry::Constant { .. })
    }

    fn field_lookup_relation(&self, _field: &str) -> String {
        "[3]".to_string()
    }

    fn field_tag(&self, model: &Model, field: &str) -> SessionResult<Option<String>> {
        let entry = model.get(field).ok_or_else(|| {
            SessionError::InvalidModel(format!("model has no constant for field '{field}'"))
        })?;
        Ok(Some(entry.constant_value()?.to_string()))
    }

    fn type_of_value(&mut self, value: &str) -> Rc<ViperType> {
        let tag = match &self.type_relation {
            Some(relation) => relation.apply(&[value]).ok(),
            None => None,
        };
        let key = match &tag {
            Some(tag) => tag.as_str(),
            None => {
                warn!("model has no 'type' relation entry for value '{value}'");
                value
            }
        };
        if let Some(typ) = self.types.get(key) {
            return Rc::clone(typ);
        }
        let typ = Rc::new(ViperType::Other {
            name: key.to_string(),
            inner: Some(key.to_string()),
        });
        self.types.insert(key.to_string(), Rc::clone(&typ));
        typ
    }
}
