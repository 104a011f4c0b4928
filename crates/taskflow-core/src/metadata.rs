//! Almacén de resultados por step, indexado por nombre.
//!
//! Cada step puede dejar un valor opaco (JSON) al correr su acción o su
//! condición; cualquier step posterior, o un lector externo, lo recupera
//! por el nombre del step escritor. El valor escrito por el intento `k`
//! queda visible para el intento `k+1`: no hay rollback en reintentos, y
//! un fallo posterior jamás corrompe entradas de steps ya completados.
//!
//! Los nombres no están obligados a ser únicos: ante nombres repetidos la
//! entrada es del escritor ejecutado más recientemente (last-writer-wins).
//! Es la convención del dominio, aquí documentada como comportamiento.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: HashMap<String, Value>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guarda (o reemplaza) la entrada del step `step_name`.
    pub fn set_value(&mut self, step_name: &str, value: Value) {
        self.entries.insert(step_name.to_string(), value);
    }

    /// Serializa `value` y lo guarda bajo `step_name`.
    pub fn set<T: Serialize>(&mut self, step_name: &str, value: &T) -> serde_json::Result<()> {
        let v = serde_json::to_value(value)?;
        self.set_value(step_name, v);
        Ok(())
    }

    /// Valor crudo, si el step escribió alguno.
    pub fn get_value(&self, step_name: &str) -> Option<&Value> {
        self.entries.get(step_name)
    }

    /// Valor deserializado a `T`. `None` si el step no corrió, nunca
    /// escribió, o el valor no tiene la forma pedida.
    pub fn get<T: DeserializeOwned>(&self, step_name: &str) -> Option<T> {
        self.entries
            .get(step_name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, step_name: &str) -> bool {
        self.entries.contains_key(step_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_entry_reads_none() {
        let store = MetadataStore::new();
        assert_eq!(store.get::<u32>("never-ran"), None);
        assert!(!store.contains("never-ran"));
    }

    #[test]
    fn typed_round_trip_and_overwrite() {
        let mut store = MetadataStore::new();
        store.set("find npc", &42u32).unwrap();
        assert_eq!(store.get::<u32>("find npc"), Some(42));

        // Un escritor posterior con el mismo nombre gana.
        store.set_value("find npc", json!({"id": 7}));
        assert_eq!(store.get::<u32>("find npc"), None);
        assert_eq!(store.get_value("find npc"), Some(&json!({"id": 7})));
    }

    #[test]
    fn wrong_shape_reads_none() {
        let mut store = MetadataStore::new();
        store.set_value("step", json!("a string"));
        assert_eq!(store.get::<Vec<u8>>("step"), None);
    }
}
