//! Shared building-model test domain
//!
//! A small closed domain (zones, surfaces, constructions, materials, zone
//! lists, plus a self-pairing `Loop` for cycle tests and an unsupported
//! `Shading`) with forward and reverse rules.

#![allow(dead_code)]

use model_bridge::{
    append_group, Dispatch, DispatchEntry, DomainObject, FieldValue, Handle, LinkResolver,
    MappingError, ObjectStore, ReverseTable, SchemaCatalog, TargetRecord, TranslationContext,
};

pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::from_json_str(include_str!("../fixtures/building_schemas.json")).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Zone,
    Surface,
    Construction,
    Material,
    ZoneList,
    Loop,
    Shading,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Zone {
        multiplier: i64,
    },
    Surface {
        surface_type: String,
        construction: Option<Handle>,
        zone: Option<Handle>,
        vertices: Vec<[f64; 3]>,
    },
    Construction {
        layers: Vec<Handle>,
    },
    Material {
        thickness: Option<f64>,
    },
    ZoneList {
        zones: Vec<Handle>,
    },
    Loop {
        partner: Option<Handle>,
        broken: bool,
    },
    Shading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obj {
    pub handle: Handle,
    pub name: Option<String>,
    pub kind: Kind,
}

impl DomainObject for Obj {
    type Variant = Variant;

    fn handle(&self) -> Handle {
        self.handle
    }

    fn variant(&self) -> Variant {
        match self.kind {
            Kind::Zone { .. } => Variant::Zone,
            Kind::Surface { .. } => Variant::Surface,
            Kind::Construction { .. } => Variant::Construction,
            Kind::Material { .. } => Variant::Material,
            Kind::ZoneList { .. } => Variant::ZoneList,
            Kind::Loop { .. } => Variant::Loop,
            Kind::Shading => Variant::Shading,
        }
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn references(&self) -> Vec<Handle> {
        match &self.kind {
            Kind::Surface {
                construction, zone, ..
            } => construction.iter().chain(zone.iter()).copied().collect(),
            Kind::Construction { layers } => layers.clone(),
            Kind::ZoneList { zones } => zones.clone(),
            Kind::Loop { partner, .. } => partner.iter().copied().collect(),
            Kind::Zone { .. } | Kind::Material { .. } | Kind::Shading => Vec::new(),
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

fn obj(name: Option<&str>, kind: Kind) -> Obj {
    Obj {
        handle: Handle::new(),
        name: name.map(str::to_string),
        kind,
    }
}

pub fn zone(name: &str, multiplier: i64) -> Obj {
    obj(Some(name), Kind::Zone { multiplier })
}

pub fn material(name: Option<&str>, thickness: Option<f64>) -> Obj {
    obj(name, Kind::Material { thickness })
}

pub fn construction(name: &str, layers: &[&Obj]) -> Obj {
    obj(
        Some(name),
        Kind::Construction {
            layers: layers.iter().map(|o| o.handle).collect(),
        },
    )
}

pub fn surface(name: &str, construction: Option<&Obj>, zone: Option<&Obj>) -> Obj {
    obj(
        Some(name),
        Kind::Surface {
            surface_type: "Wall".to_string(),
            construction: construction.map(|o| o.handle),
            zone: zone.map(|o| o.handle),
            vertices: vec![[0.0, 0.0, 3.0], [0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 0.0, 3.0]],
        },
    )
}

pub fn zone_list(name: &str, zones: &[&Obj]) -> Obj {
    obj(
        Some(name),
        Kind::ZoneList {
            zones: zones.iter().map(|o| o.handle).collect(),
        },
    )
}

pub fn loop_obj(name: &str, broken: bool) -> Obj {
    obj(
        Some(name),
        Kind::Loop {
            partner: None,
            broken,
        },
    )
}

/// Point two loops at each other
pub fn pair(a: &mut Obj, b: &mut Obj) {
    if let Kind::Loop { partner, .. } = &mut a.kind {
        *partner = Some(b.handle);
    }
    if let Kind::Loop { partner, .. } = &mut b.kind {
        *partner = Some(a.handle);
    }
}

pub fn shading(name: &str) -> Obj {
    obj(Some(name), Kind::Shading)
}

pub fn store(objects: &[&Obj]) -> ObjectStore<Obj> {
    objects.iter().map(|o| (*o).clone()).collect()
}

// =============================================================================
// Forward rules
// =============================================================================

pub struct BuildingDispatch;

impl Dispatch<Obj> for BuildingDispatch {
    fn entry(&self, object: &Obj) -> Option<DispatchEntry<Obj>> {
        match object.variant() {
            Variant::Zone => Some(DispatchEntry::new("Zone", zone_rule)),
            Variant::Surface => Some(DispatchEntry::new("Surface", surface_rule)),
            Variant::Construction => Some(DispatchEntry::new("Construction", construction_rule)),
            Variant::Material => Some(DispatchEntry::new("Material", material_rule)),
            Variant::ZoneList => Some(DispatchEntry::new("ZoneList", zone_list_rule)),
            Variant::Loop => Some(DispatchEntry::new("Loop", loop_rule)),
            Variant::Shading => None,
        }
    }
}

type RuleResult = Result<TargetRecord, MappingError>;

fn zone_rule(o: &Obj, ctx: &mut TranslationContext<'_, Obj>) -> RuleResult {
    let Kind::Zone { multiplier } = &o.kind else {
        unreachable!()
    };
    let mut record = ctx.create_named_record("Zone", o)?;
    record.set("Multiplier", *multiplier)?;
    Ok(record)
}

fn material_rule(o: &Obj, ctx: &mut TranslationContext<'_, Obj>) -> RuleResult {
    let Kind::Material { thickness } = &o.kind else {
        unreachable!()
    };
    let thickness = thickness.ok_or_else(|| MappingError::missing("Thickness"))?;
    let mut record = ctx.create_named_record("Material", o)?;
    record.set("Thickness", thickness)?;
    Ok(record)
}

fn construction_rule(o: &Obj, ctx: &mut TranslationContext<'_, Obj>) -> RuleResult {
    let Kind::Construction { layers } = &o.kind else {
        unreachable!()
    };
    let mut record = ctx.create_named_record("Construction", o)?;
    for layer in ctx.references(layers)? {
        append_group(&mut record, [layer])?;
    }
    Ok(record)
}

fn surface_rule(o: &Obj, ctx: &mut TranslationContext<'_, Obj>) -> RuleResult {
    let Kind::Surface {
        surface_type,
        construction,
        zone,
        vertices,
    } = &o.kind
    else {
        unreachable!()
    };
    let mut record = ctx.create_named_record("Surface", o)?;
    record.set("Surface Type", surface_type.as_str())?;
    let construction = ctx.reference(*construction)?;
    record.set("Construction Name", construction)?;
    let zone = ctx.reference(*zone)?;
    record.set("Zone Name", zone)?;
    for [x, y, z] in vertices {
        append_group(&mut record, [*x, *y, *z])?;
    }
    Ok(record)
}

fn zone_list_rule(o: &Obj, ctx: &mut TranslationContext<'_, Obj>) -> RuleResult {
    let Kind::ZoneList { zones } = &o.kind else {
        unreachable!()
    };
    let mut record = ctx.create_named_record("ZoneList", o)?;
    for zone in ctx.references(zones)? {
        append_group(&mut record, [zone])?;
    }
    Ok(record)
}

fn loop_rule(o: &Obj, ctx: &mut TranslationContext<'_, Obj>) -> RuleResult {
    let Kind::Loop { partner, broken } = &o.kind else {
        unreachable!()
    };
    let mut record = ctx.create_named_record("Loop", o)?;
    let partner = ctx.reference(*partner)?;
    record.set("Partner", partner)?;
    if *broken {
        return Err(MappingError::missing("Partner"));
    }
    Ok(record)
}

// =============================================================================
// Reverse rules
// =============================================================================

type AllocResult = Result<Obj, MappingError>;
type LinkResult = Result<(), MappingError>;

fn named(record: &TargetRecord, handle: Handle, kind: Kind) -> Obj {
    Obj {
        handle,
        name: record.name().map(str::to_string),
        kind,
    }
}

fn alloc_zone(record: &TargetRecord, handle: Handle) -> AllocResult {
    let multiplier = record
        .get("Multiplier")
        .and_then(FieldValue::as_integer)
        .unwrap_or(1);
    Ok(named(record, handle, Kind::Zone { multiplier }))
}

fn alloc_material(record: &TargetRecord, handle: Handle) -> AllocResult {
    let thickness = record.get("Thickness").and_then(FieldValue::as_real);
    Ok(named(record, handle, Kind::Material { thickness }))
}

fn alloc_construction(record: &TargetRecord, handle: Handle) -> AllocResult {
    Ok(named(record, handle, Kind::Construction { layers: Vec::new() }))
}

fn link_construction(record: &TargetRecord, o: &mut Obj, resolver: &mut LinkResolver) -> LinkResult {
    if let Kind::Construction { layers } = &mut o.kind {
        *layers = resolver.resolve_group_field(record, "Layer");
    }
    Ok(())
}

fn alloc_surface(record: &TargetRecord, handle: Handle) -> AllocResult {
    let surface_type = record
        .get("Surface Type")
        .and_then(FieldValue::as_text)
        .ok_or_else(|| MappingError::missing("Surface Type"))?
        .to_string();
    let vertices = record
        .groups()
        .map(|g| {
            [
                g[0].as_real().unwrap_or_default(),
                g[1].as_real().unwrap_or_default(),
                g[2].as_real().unwrap_or_default(),
            ]
        })
        .collect();
    Ok(named(
        record,
        handle,
        Kind::Surface {
            surface_type,
            construction: None,
            zone: None,
            vertices,
        },
    ))
}

fn link_surface(record: &TargetRecord, o: &mut Obj, resolver: &mut LinkResolver) -> LinkResult {
    if let Kind::Surface {
        construction, zone, ..
    } = &mut o.kind
    {
        *construction = resolver.resolve_field(record, "Construction Name");
        *zone = resolver.resolve_field(record, "Zone Name");
    }
    Ok(())
}

fn alloc_zone_list(record: &TargetRecord, handle: Handle) -> AllocResult {
    Ok(named(record, handle, Kind::ZoneList { zones: Vec::new() }))
}

fn link_zone_list(record: &TargetRecord, o: &mut Obj, resolver: &mut LinkResolver) -> LinkResult {
    if let Kind::ZoneList { zones } = &mut o.kind {
        *zones = resolver.resolve_group_field(record, "Zone Name");
    }
    Ok(())
}

fn alloc_loop(record: &TargetRecord, handle: Handle) -> AllocResult {
    Ok(named(
        record,
        handle,
        Kind::Loop {
            partner: None,
            broken: false,
        },
    ))
}

fn link_loop(record: &TargetRecord, o: &mut Obj, resolver: &mut LinkResolver) -> LinkResult {
    if let Kind::Loop { partner, .. } = &mut o.kind {
        *partner = resolver.resolve_field(record, "Partner");
    }
    Ok(())
}

pub fn reverse_table() -> ReverseTable<Obj> {
    ReverseTable::new()
        .with_scalar("Zone", alloc_zone)
        .with_scalar("Material", alloc_material)
        .with_rules("Construction", alloc_construction, link_construction)
        .with_rules("Surface", alloc_surface, link_surface)
        .with_rules("ZoneList", alloc_zone_list, link_zone_list)
        .with_rules("Loop", alloc_loop, link_loop)
}

// =============================================================================
// Comparison
// =============================================================================

/// Object rendered with references replaced by the target's name, so
/// objects from different runs compare by content
pub fn describe(o: &Obj, store: &ObjectStore<Obj>) -> String {
    let name_of = |h: &Handle| {
        store
            .get(*h)
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| "?".to_string())
    };
    let names = |hs: &[Handle]| hs.iter().map(name_of).collect::<Vec<_>>().join(",");
    let body = match &o.kind {
        Kind::Zone { multiplier } => format!("Zone x{}", multiplier),
        Kind::Surface {
            surface_type,
            construction,
            zone,
            vertices,
        } => format!(
            "Surface {} c={} z={} v={:?}",
            surface_type,
            construction.as_ref().map(name_of).unwrap_or_default(),
            zone.as_ref().map(name_of).unwrap_or_default(),
            vertices
        ),
        Kind::Construction { layers } => format!("Construction [{}]", names(layers)),
        Kind::Material { thickness } => format!("Material {:?}", thickness),
        Kind::ZoneList { zones } => format!("ZoneList [{}]", names(zones)),
        Kind::Loop { partner, .. } => {
            format!("Loop -> {}", partner.as_ref().map(name_of).unwrap_or_default())
        }
        Kind::Shading => "Shading".to_string(),
    };
    format!("{}: {}", o.name.as_deref().unwrap_or(""), body)
}
