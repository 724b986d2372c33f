use crate::auth_session::SessionToken;
use crate::data_store::auth_token::{AuthToken, Privilege};
use crate::data_store::models::{
    Equipment, FullNewReservation, FullReservation, NewEquipment, NewRoom, NewUser, Reservation,
    ReservationStatus, Room, User,
};
use crate::data_store::password::verify_password;
use crate::data_store::{
    checks, models, ClassyStore, ClassyStoreFacade, EquipmentId, ReservationFilter, ReservationId,
    RoomId, StoreError, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/**
 * A mock [ClassyStore] implementation for testing.
 *
 * The simulated database consists of the [StoreMockData] structure with vectors of entities. These
 * can be directly modified by the tests.
 *
 * The mock runs the same privilege checks, resource checks and double booking validation as the
 * PostgreSQL implementation. Deleted rooms and equipment items are removed from the vectors.
 * The [StoreMockData.next_error] attribute can be set to simulate a database error.
 */
#[derive(Default)]
pub struct StoreMock {
    pub data: Mutex<StoreMockData>,
}

impl ClassyStore for StoreMock {
    fn get_facade<'a>(&'a self) -> Result<Box<dyn ClassyStoreFacade + 'a>, StoreError> {
        Ok(Box::new(StoreMockFacade { store: self }))
    }
}

#[derive(Default)]
pub struct StoreMockData {
    pub users: Vec<User>,
    pub rooms: Vec<Room>,
    pub equipment: Vec<Equipment>,
    pub reservations: Vec<FullReservation>,
    /// Session token digest, user id, and creation time of each session
    pub sessions: Vec<(Vec<u8>, UserId, DateTime<Utc>)>,
    /// Last id assigned to a newly created entity (of any kind)
    pub last_id: i32,
    /// If not none, the next call to a store facade method will return this error.
    pub next_error: Option<StoreError>,
}

impl StoreMockData {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn check_next_error(&mut self) -> Result<(), StoreError> {
        match self.next_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn find_reservation(&self, reservation_id: ReservationId) -> Result<usize, StoreError> {
        self.reservations
            .iter()
            .position(|r| r.reservation.id == reservation_id)
            .ok_or(StoreError::NotExisting)
    }

    fn check_resources_bookable(
        &self,
        reservation: &FullNewReservation,
        previous: Option<&FullReservation>,
    ) -> Result<(), StoreError> {
        checks::check_resources_bookable(
            &reservation.resources,
            previous.map(|p| &p.resources),
            &self.rooms,
            &self.equipment,
        )
    }
}

struct StoreMockFacade<'a> {
    store: &'a StoreMock,
}

impl<'a> ClassyStoreFacade for StoreMockFacade<'a> {
    fn authenticate_with_password(
        &mut self,
        email: &str,
        password: &str,
        session_token: &SessionToken,
    ) -> Result<User, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        let email = email.trim().to_lowercase();
        let user = data
            .users
            .iter()
            .find(|u| u.email == email && verify_password(password, &u.password_hash))
            .cloned()
            .ok_or(StoreError::AuthenticationFailed)?;
        data.sessions
            .push((session_token.digest(), user.id, chrono::Utc::now()));
        Ok(user)
    }

    fn get_auth_token_for_session(
        &mut self,
        session_token: &SessionToken,
        max_age: chrono::Duration,
    ) -> Result<AuthToken, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        let digest = session_token.digest();
        let min_created_at = chrono::Utc::now() - max_age;
        let user_id = data
            .sessions
            .iter()
            .find(|(token_hash, _, created_at)| *token_hash == digest && *created_at > min_created_at)
            .map(|(_, user_id, _)| *user_id)
            .ok_or(StoreError::InvalidSession)?;
        let user = data
            .users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::InvalidSession)?;
        Ok(AuthToken::create_for_session(user.id, user.role))
    }

    fn logout(&mut self, session_token: &SessionToken) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        let digest = session_token.digest();
        data.sessions.retain(|(token_hash, _, _)| *token_hash != digest);
        Ok(())
    }

    fn get_users(&mut self, auth_token: &AuthToken) -> Result<Vec<User>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        let mut result = data.users.clone();
        result.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(result)
    }

    fn get_user(&mut self, auth_token: &AuthToken, user_id: UserId) -> Result<User, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_owner_or_privilege(Some(user_id), Privilege::ManageUsers)?;
        data.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn create_user(&mut self, auth_token: &AuthToken, user: NewUser) -> Result<UserId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        let Some(password_hash) = user.password_hash else {
            return Err(StoreError::InvalidInputData(
                "A password is required for new users.".to_owned(),
            ));
        };
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::ConflictEntityExists);
        }
        let id = data.next_id();
        data.users.push(User {
            id,
            name: user.name,
            email: user.email,
            role: user.role,
            password_hash,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    fn update_user(
        &mut self,
        auth_token: &AuthToken,
        user_id: UserId,
        user: NewUser,
    ) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        if data
            .users
            .iter()
            .any(|u| u.id != user_id && u.email == user.email)
        {
            return Err(StoreError::ConflictEntityExists);
        }
        let existing = data
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotExisting)?;
        existing.name = user.name;
        existing.email = user.email;
        existing.role = user.role;
        if let Some(password_hash) = user.password_hash {
            existing.password_hash = password_hash;
        }
        Ok(())
    }

    fn delete_user(&mut self, auth_token: &AuthToken, user_id: UserId) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        if auth_token.user_id() == Some(user_id) {
            return Err(StoreError::InvalidInputData(
                "Users cannot delete their own account.".to_owned(),
            ));
        }
        let index = data
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or(StoreError::NotExisting)?;
        data.users.remove(index);
        data.sessions.retain(|(_, session_user, _)| *session_user != user_id);
        for reservation in data.reservations.iter_mut() {
            if reservation.reservation.user_id == Some(user_id) {
                reservation.reservation.user_id = None;
            }
        }
        Ok(())
    }

    fn get_rooms(&mut self, auth_token: &AuthToken) -> Result<Vec<Room>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowInventory)?;
        let mut result = data.rooms.clone();
        result.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(result)
    }

    fn get_room(&mut self, auth_token: &AuthToken, room_id: RoomId) -> Result<Room, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowInventory)?;
        data.rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn create_room(&mut self, auth_token: &AuthToken, room: NewRoom) -> Result<RoomId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        let id = data.next_id();
        data.rooms.push(Room {
            id,
            name: room.name,
            room_type: room.room_type,
            capacity: room.capacity,
            location: room.location,
            available: room.available,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    fn update_room(
        &mut self,
        auth_token: &AuthToken,
        room_id: RoomId,
        room: NewRoom,
    ) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        let existing = data
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or(StoreError::NotExisting)?;
        existing.name = room.name;
        existing.room_type = room.room_type;
        existing.capacity = room.capacity;
        existing.location = room.location;
        existing.available = room.available;
        Ok(())
    }

    fn delete_room(&mut self, auth_token: &AuthToken, room_id: RoomId) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        let index = data
            .rooms
            .iter()
            .position(|r| r.id == room_id)
            .ok_or(StoreError::NotExisting)?;
        data.rooms.remove(index);
        Ok(())
    }

    fn get_equipment(&mut self) -> Result<Vec<Equipment>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        let mut result = data.equipment.clone();
        result.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(result)
    }

    fn get_equipment_item(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
    ) -> Result<Equipment, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowInventory)?;
        data.equipment
            .iter()
            .find(|e| e.id == equipment_id)
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn get_equipment_by_barcode(
        &mut self,
        auth_token: &AuthToken,
        barcode: &str,
    ) -> Result<Equipment, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowInventory)?;
        data.equipment
            .iter()
            .find(|e| e.barcode.as_deref() == Some(barcode))
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn search_equipment(
        &mut self,
        auth_token: &AuthToken,
        query: &str,
    ) -> Result<Vec<Equipment>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowInventory)?;
        let query = query.trim().to_lowercase();
        let mut result: Vec<Equipment> = data
            .equipment
            .iter()
            .filter(|e| e.matches_search(&query))
            .cloned()
            .collect();
        result.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(result)
    }

    fn create_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment: NewEquipment,
    ) -> Result<EquipmentId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        if equipment.barcode.is_some()
            && data.equipment.iter().any(|e| e.barcode == equipment.barcode)
        {
            return Err(StoreError::ConflictEntityExists);
        }
        let id = data.next_id();
        data.equipment.push(Equipment {
            id,
            name: equipment.name,
            code: equipment.code,
            barcode: equipment.barcode,
            category: equipment.category,
            condition: equipment.condition,
            available: equipment.available,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    fn update_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
        equipment: NewEquipment,
    ) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        if equipment.barcode.is_some()
            && data
                .equipment
                .iter()
                .any(|e| e.id != equipment_id && e.barcode == equipment.barcode)
        {
            return Err(StoreError::ConflictEntityExists);
        }
        let existing = data
            .equipment
            .iter_mut()
            .find(|e| e.id == equipment_id)
            .ok_or(StoreError::NotExisting)?;
        existing.name = equipment.name;
        existing.code = equipment.code;
        existing.barcode = equipment.barcode;
        existing.category = equipment.category;
        existing.condition = equipment.condition;
        existing.available = equipment.available;
        Ok(())
    }

    fn delete_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
    ) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        let index = data
            .equipment
            .iter()
            .position(|e| e.id == equipment_id)
            .ok_or(StoreError::NotExisting)?;
        data.equipment.remove(index);
        Ok(())
    }

    fn get_reservations_filtered(
        &mut self,
        auth_token: &AuthToken,
        filter: ReservationFilter,
    ) -> Result<Vec<FullReservation>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowReservations)?;
        let mut result: Vec<FullReservation> = data
            .reservations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        result.sort_by_key(|r| (r.reservation.start, r.reservation.id));
        Ok(result)
    }

    fn get_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
    ) -> Result<FullReservation, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ShowReservations)?;
        let index = data.find_reservation(reservation_id)?;
        Ok(data.reservations[index].clone())
    }

    fn create_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation: FullNewReservation,
        timezone: &chrono_tz::Tz,
    ) -> Result<ReservationId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        checks::check_reservation_data(&reservation)?;
        checks::check_reservation_write_allowed(auth_token, &reservation, None)?;
        data.check_resources_bookable(&reservation, None)?;
        checks::check_no_conflict(&reservation, &data.reservations, None, timezone)?;

        let id = data.next_id();
        data.reservations.push(FullReservation {
            reservation: Reservation {
                id,
                user_id: reservation.reservation.user_id,
                start: reservation.reservation.start,
                end: reservation.reservation.end,
                status: reservation.reservation.status,
                notes: reservation.reservation.notes,
                created_at: chrono::Utc::now(),
            },
            resources: reservation.resources,
        });
        Ok(id)
    }

    fn update_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
        reservation: FullNewReservation,
        timezone: &chrono_tz::Tz,
    ) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        checks::check_reservation_data(&reservation)?;
        let index = data.find_reservation(reservation_id)?;
        let previous = &data.reservations[index];
        checks::check_reservation_write_allowed(
            auth_token,
            &reservation,
            Some(&previous.reservation),
        )?;
        data.check_resources_bookable(&reservation, Some(previous))?;
        checks::check_no_conflict(
            &reservation,
            &data.reservations,
            Some(reservation_id),
            timezone,
        )?;

        let existing = &mut data.reservations[index];
        existing.reservation.user_id = reservation.reservation.user_id;
        existing.reservation.start = reservation.reservation.start;
        existing.reservation.end = reservation.reservation.end;
        existing.reservation.status = reservation.reservation.status;
        existing.reservation.notes = reservation.reservation.notes;
        existing.resources = reservation.resources;
        Ok(())
    }

    fn set_reservation_status(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
        status: ReservationStatus,
        timezone: &chrono_tz::Tz,
    ) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        let index = data.find_reservation(reservation_id)?;
        let previous = data.reservations[index].clone();
        checks::check_status_change_allowed(auth_token, &previous.reservation, status)?;
        if previous.reservation.status != ReservationStatus::Active {
            let mut candidate: FullNewReservation = previous.into();
            candidate.reservation.status = status;
            checks::check_no_conflict(
                &candidate,
                &data.reservations,
                Some(reservation_id),
                timezone,
            )?;
        }
        data.reservations[index].reservation.status = status;
        Ok(())
    }

    fn import_data(
        &mut self,
        auth_token: &AuthToken,
        import: models::ImportData,
    ) -> Result<models::ImportSummary, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        data.check_next_error()?;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        auth_token.check_privilege(Privilege::ManageAllReservations)?;

        // Work on a copy, to discard everything on failure like a database transaction would
        let mut staged = StoreMockData {
            users: data.users.clone(),
            rooms: data.rooms.clone(),
            equipment: data.equipment.clone(),
            reservations: data.reservations.clone(),
            sessions: data.sessions.clone(),
            last_id: data.last_id,
            next_error: None,
        };
        let now = chrono::Utc::now();
        let mut user_ids = HashMap::new();
        for (old_id, user) in import.users {
            if staged.users.iter().any(|u| u.email == user.email) {
                return Err(StoreError::ConflictEntityExists);
            }
            let id = staged.next_id();
            staged.users.push(User {
                id,
                name: user.name,
                email: user.email,
                role: user.role,
                password_hash: user.password_hash.unwrap_or_default(),
                created_at: now,
            });
            user_ids.insert(old_id, id);
        }
        let mut room_ids = HashMap::new();
        for (old_id, room) in import.rooms {
            let id = staged.next_id();
            staged.rooms.push(Room {
                id,
                name: room.name,
                room_type: room.room_type,
                capacity: room.capacity,
                location: room.location,
                available: room.available,
                created_at: now,
            });
            room_ids.insert(old_id, id);
        }
        let mut equipment_ids = HashMap::new();
        for (old_id, item) in import.equipment {
            let id = staged.next_id();
            staged.equipment.push(Equipment {
                id,
                name: item.name,
                code: item.code,
                barcode: item.barcode,
                category: item.category,
                condition: item.condition,
                available: item.available,
                created_at: now,
            });
            equipment_ids.insert(old_id, id);
        }
        let mut summary = models::ImportSummary {
            users: user_ids.len(),
            rooms: room_ids.len(),
            equipment: equipment_ids.len(),
            reservations: 0,
        };
        for reservation in import.reservations {
            let reservation =
                checks::translate_import_ids(reservation, &user_ids, &room_ids, &equipment_ids)?;
            checks::check_reservation_data(&reservation)?;
            let id = staged.next_id();
            staged.reservations.push(FullReservation {
                reservation: Reservation {
                    id,
                    user_id: reservation.reservation.user_id,
                    start: reservation.reservation.start,
                    end: reservation.reservation.end,
                    status: reservation.reservation.status,
                    notes: reservation.reservation.notes,
                    created_at: now,
                },
                resources: reservation.resources,
            });
            summary.reservations += 1;
        }
        *data = staged;
        Ok(summary)
    }
}
