//! Toy in-memory cars resource
//!
//! Exists to demonstrate the idempotency wiring; the repository is a plain
//! concurrent map with no persistence.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCar {
    pub make: String,
    pub model: String,
    pub year: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCar {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
}

#[derive(Default)]
pub struct CarRepository {
    cars: DashMap<Uuid, Car>,
}

impl CarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, input: CreateCar) -> Car {
        let car = Car {
            id: Uuid::new_v4(),
            make: input.make,
            model: input.model,
            year: input.year,
            created_at: Utc::now(),
        };
        self.cars.insert(car.id, car.clone());
        car
    }

    pub fn get(&self, id: Uuid) -> Option<Car> {
        self.cars.get(&id).map(|car| car.value().clone())
    }

    pub fn update(&self, id: Uuid, input: UpdateCar) -> Option<Car> {
        let mut entry = self.cars.get_mut(&id)?;
        if let Some(make) = input.make {
            entry.make = make;
        }
        if let Some(model) = input.model {
            entry.model = model;
        }
        if let Some(year) = input.year {
            entry.year = year;
        }
        Some(entry.value().clone())
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.cars.remove(&id).is_some()
    }

    pub fn list(&self) -> Vec<Car> {
        self.cars.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }
}
