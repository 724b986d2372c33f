use crate::data_store::{EquipmentId, RoomId};

/// The set of rooms and equipment items claimed by a reservation.
///
/// Both id lists are kept sorted and free of duplicates, so two sets can be compared and
/// intersected without caring about the shape in which a client sent its resource references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceSet {
    room_ids: Vec<RoomId>,
    equipment_ids: Vec<EquipmentId>,
}

impl ResourceSet {
    pub fn new(
        room_ids: impl IntoIterator<Item = RoomId>,
        equipment_ids: impl IntoIterator<Item = EquipmentId>,
    ) -> Self {
        let mut room_ids: Vec<RoomId> = room_ids.into_iter().collect();
        room_ids.sort_unstable();
        room_ids.dedup();
        let mut equipment_ids: Vec<EquipmentId> = equipment_ids.into_iter().collect();
        equipment_ids.sort_unstable();
        equipment_ids.dedup();
        Self {
            room_ids,
            equipment_ids,
        }
    }

    /// Collect all resource references of a reservation request, regardless of the field they
    /// were sent in (single id, id list or nested object, English or Spanish field name).
    pub fn from_request(request: &classy_api_types::NewReservation) -> Self {
        Self::new(
            request
                .room_id
                .into_iter()
                .chain(request.room_ids.iter().copied())
                .chain(request.room.iter().map(|r| r.id)),
            request
                .equipment_id
                .into_iter()
                .chain(request.equipment_ids.iter().copied())
                .chain(request.equipment.iter().map(|e| e.id)),
        )
    }

    pub fn room_ids(&self) -> &[RoomId] {
        &self.room_ids
    }

    pub fn equipment_ids(&self) -> &[EquipmentId] {
        &self.equipment_ids
    }

    pub fn is_empty(&self) -> bool {
        self.room_ids.is_empty() && self.equipment_ids.is_empty()
    }

    pub fn shares_room_with(&self, other: &ResourceSet) -> bool {
        sorted_lists_intersect(&self.room_ids, &other.room_ids)
    }

    pub fn shares_equipment_with(&self, other: &ResourceSet) -> bool {
        sorted_lists_intersect(&self.equipment_ids, &other.equipment_ids)
    }
}

fn sorted_lists_intersect(a: &[i32], b: &[i32]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}
