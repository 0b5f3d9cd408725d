//! Minimal object file writers for driving the converter end to end.

#![allow(dead_code)]

use std::path::PathBuf;

use byteorder::{WriteBytesExt, LE};

pub struct ObjSymbol {
    pub name: &'static str,
    /// Offset into the data section.
    pub offset: u64,
}

/// Packs a `CFE_TBL_FileDef` descriptor the way the C compiler lays it out.
pub fn descriptor(
    object_name: &str,
    table_name: &str,
    description: &str,
    target_file_name: &str,
    object_size: u32,
) -> Vec<u8> {
    let mut out = Vec::new();
    for (text, width) in [
        (object_name, 64),
        (table_name, 40),
        (description, 32),
        (target_file_name, 20),
    ] {
        let mut field = text.as_bytes().to_vec();
        field.resize(width, 0);
        out.extend(field);
    }
    out.write_u32::<LE>(object_size).unwrap();
    out
}

/// `.data` image of the reference table: payload `01 02 03 04` at offset 0,
/// descriptor at offset 16.
pub fn reference_data(object_size: u32) -> Vec<u8> {
    let mut data = vec![0x01, 0x02, 0x03, 0x04];
    data.resize(16, 0);
    data.extend(descriptor(
        "MyTableObj",
        "MY_APP.MyTable",
        "Example table",
        "mytbl.tbl",
        object_size,
    ));
    data
}

pub fn reference_symbols() -> Vec<ObjSymbol> {
    vec![
        ObjSymbol {
            name: "CFE_TBL_FileDef",
            offset: 16,
        },
        ObjSymbol {
            name: "MyTableObj",
            offset: 0,
        },
    ]
}

fn align(buf: &mut Vec<u8>, to: usize) {
    while buf.len() % to != 0 {
        buf.push(0);
    }
}

fn strtab(names: &[&str]) -> (Vec<u8>, Vec<u32>) {
    let mut table = vec![0u8];
    let mut offsets = Vec::new();
    for name in names {
        offsets.push(table.len() as u32);
        table.extend_from_slice(name.as_bytes());
        table.push(0);
    }
    (table, offsets)
}

/// Little-endian ELF64 relocatable object with sections
/// `[null, .data, .symtab, .strtab, .shstrtab]`; every symbol lives in `.data`.
pub fn elf_object(data: &[u8], symbols: &[ObjSymbol]) -> Vec<u8> {
    elf_object_with_bss(data, symbols, None)
}

/// As [`elf_object`], with a trailing `SHT_NOBITS` `.bss` header of
/// `bss_size` bytes when given.
pub fn elf_object_with_bss(data: &[u8], symbols: &[ObjSymbol], bss_size: Option<u64>) -> Vec<u8> {
    const EHDR_LEN: usize = 64;
    const SHDR_LEN: usize = 64;
    const SYM_LEN: usize = 24;

    let mut out = vec![0u8; EHDR_LEN];

    let data_off = out.len();
    out.extend_from_slice(data);
    align(&mut out, 8);

    let names: Vec<&str> = symbols.iter().map(|s| s.name).collect();
    let (sym_strtab, sym_name_offs) = strtab(&names);

    let symtab_off = out.len();
    out.extend(std::iter::repeat(0).take(SYM_LEN));
    for (sym, name_off) in symbols.iter().zip(&sym_name_offs) {
        out.write_u32::<LE>(*name_off).unwrap();
        out.write_u8(0x11).unwrap(); // STB_GLOBAL, STT_OBJECT
        out.write_u8(0).unwrap();
        out.write_u16::<LE>(1).unwrap(); // .data
        out.write_u64::<LE>(sym.offset).unwrap();
        out.write_u64::<LE>(4).unwrap();
    }
    let symtab_len = out.len() - symtab_off;

    let strtab_off = out.len();
    out.extend_from_slice(&sym_strtab);

    let (shstrtab, sh_names) = strtab(&[".data", ".symtab", ".strtab", ".shstrtab", ".bss"]);
    let shstrtab_off = out.len();
    out.extend_from_slice(&shstrtab);
    align(&mut out, 8);

    let shoff = out.len();
    let mut shdr = |name: u32, ty: u32, flags: u64, off: usize, size: usize, link: u32, info: u32, entsize: u64| {
        out.write_u32::<LE>(name).unwrap();
        out.write_u32::<LE>(ty).unwrap();
        out.write_u64::<LE>(flags).unwrap();
        out.write_u64::<LE>(0).unwrap(); // sh_addr
        out.write_u64::<LE>(off as u64).unwrap();
        out.write_u64::<LE>(size as u64).unwrap();
        out.write_u32::<LE>(link).unwrap();
        out.write_u32::<LE>(info).unwrap();
        out.write_u64::<LE>(if ty == 0 { 0 } else { 1 }).unwrap(); // sh_addralign
        out.write_u64::<LE>(entsize).unwrap();
    };
    shdr(0, 0, 0, 0, 0, 0, 0, 0);
    shdr(sh_names[0], 1, 0x3, data_off, data.len(), 0, 0, 0);
    shdr(sh_names[1], 2, 0, symtab_off, symtab_len, 3, 1, SYM_LEN as u64);
    shdr(sh_names[2], 3, 0, strtab_off, sym_strtab.len(), 0, 0, 0);
    shdr(sh_names[3], 3, 0, shstrtab_off, shstrtab.len(), 0, 0, 0);
    if let Some(size) = bss_size {
        shdr(sh_names[4], 8, 0x3, shoff, size as usize, 0, 0, 0); // SHT_NOBITS
    }
    let shnum = if bss_size.is_some() { 6 } else { 5 };
    assert_eq!(out.len(), shoff + shnum * SHDR_LEN);

    let mut ehdr = Vec::with_capacity(EHDR_LEN);
    ehdr.extend_from_slice(b"\x7fELF");
    ehdr.extend_from_slice(&[2, 1, 1, 0]); // ELFCLASS64, ELFDATA2LSB, EV_CURRENT, SYSV
    ehdr.extend_from_slice(&[0; 8]);
    ehdr.write_u16::<LE>(1).unwrap(); // ET_REL
    ehdr.write_u16::<LE>(62).unwrap(); // EM_X86_64
    ehdr.write_u32::<LE>(1).unwrap();
    ehdr.write_u64::<LE>(0).unwrap(); // e_entry
    ehdr.write_u64::<LE>(0).unwrap(); // e_phoff
    ehdr.write_u64::<LE>(shoff as u64).unwrap();
    ehdr.write_u32::<LE>(0).unwrap(); // e_flags
    ehdr.write_u16::<LE>(EHDR_LEN as u16).unwrap();
    ehdr.write_u16::<LE>(0).unwrap(); // e_phentsize
    ehdr.write_u16::<LE>(0).unwrap(); // e_phnum
    ehdr.write_u16::<LE>(SHDR_LEN as u16).unwrap();
    ehdr.write_u16::<LE>(shnum as u16).unwrap(); // e_shnum
    ehdr.write_u16::<LE>(4).unwrap(); // e_shstrndx
    out[..EHDR_LEN].copy_from_slice(&ehdr);

    out
}

/// Address of `__data` in [`macho_object`] images.
pub const MACHO_DATA_ADDR: u64 = 0x10;

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

/// x86_64 Mach-O `MH_OBJECT` with one unnamed segment holding `__TEXT,__text`
/// and `__DATA,__data`. Symbols are emitted with the leading underscore the C
/// compiler adds, and their values are addresses, as in a real object.
pub fn macho_object(data: &[u8], symbols: &[ObjSymbol]) -> Vec<u8> {
    const HEADER_LEN: usize = 32;
    const SEGMENT_LEN: usize = 72;
    const SECTION_LEN: usize = 80;
    const SYMTAB_CMD_LEN: usize = 24;

    let cmds_len = SEGMENT_LEN + 2 * SECTION_LEN + SYMTAB_CMD_LEN;
    let text_off = HEADER_LEN + cmds_len;
    let text = [0xc3u8; MACHO_DATA_ADDR as usize];
    let data_off = text_off + text.len();
    let seg_len = text.len() + data.len();

    let mut symtab = Vec::new();
    let mangled: Vec<String> = symbols.iter().map(|s| format!("_{}", s.name)).collect();
    let names: Vec<&str> = mangled.iter().map(String::as_str).collect();
    let (strs, name_offs) = strtab(&names);
    for (sym, name_off) in symbols.iter().zip(&name_offs) {
        symtab.write_u32::<LE>(*name_off).unwrap();
        symtab.write_u8(0x0f).unwrap(); // N_SECT | N_EXT
        symtab.write_u8(2).unwrap(); // __data
        symtab.write_u16::<LE>(0).unwrap();
        symtab.write_u64::<LE>(MACHO_DATA_ADDR + sym.offset).unwrap();
    }

    let mut tail = Vec::new();
    tail.extend_from_slice(&text);
    tail.extend_from_slice(data);
    align(&mut tail, 8);
    let symoff = text_off + tail.len();
    tail.extend_from_slice(&symtab);
    let stroff = text_off + tail.len();
    tail.extend_from_slice(&strs);

    let mut out = Vec::new();
    out.write_u32::<LE>(0xfeed_facf).unwrap(); // MH_MAGIC_64
    out.write_u32::<LE>(0x0100_0007).unwrap(); // CPU_TYPE_X86_64
    out.write_u32::<LE>(3).unwrap(); // CPU_SUBTYPE_X86_64_ALL
    out.write_u32::<LE>(1).unwrap(); // MH_OBJECT
    out.write_u32::<LE>(2).unwrap(); // ncmds
    out.write_u32::<LE>(cmds_len as u32).unwrap();
    out.write_u32::<LE>(0).unwrap(); // flags
    out.write_u32::<LE>(0).unwrap(); // reserved

    out.write_u32::<LE>(0x19).unwrap(); // LC_SEGMENT_64
    out.write_u32::<LE>((SEGMENT_LEN + 2 * SECTION_LEN) as u32).unwrap();
    out.extend_from_slice(&[0u8; 16]);
    out.write_u64::<LE>(0).unwrap(); // vmaddr
    out.write_u64::<LE>(seg_len as u64).unwrap(); // vmsize
    out.write_u64::<LE>(text_off as u64).unwrap(); // fileoff
    out.write_u64::<LE>(seg_len as u64).unwrap(); // filesize
    out.write_u32::<LE>(7).unwrap(); // maxprot
    out.write_u32::<LE>(7).unwrap(); // initprot
    out.write_u32::<LE>(2).unwrap(); // nsects
    out.write_u32::<LE>(0).unwrap(); // flags

    for (sect, seg, addr, size, off, flags) in [
        ("__text", "__TEXT", 0u64, text.len(), text_off, 0x8000_0400u32),
        ("__data", "__DATA", MACHO_DATA_ADDR, data.len(), data_off, 0),
    ] {
        out.extend_from_slice(&name16(sect));
        out.extend_from_slice(&name16(seg));
        out.write_u64::<LE>(addr).unwrap();
        out.write_u64::<LE>(size as u64).unwrap();
        out.write_u32::<LE>(off as u32).unwrap();
        out.write_u32::<LE>(0).unwrap(); // align
        out.write_u32::<LE>(0).unwrap(); // reloff
        out.write_u32::<LE>(0).unwrap(); // nreloc
        out.write_u32::<LE>(flags).unwrap();
        out.extend_from_slice(&[0u8; 12]); // reserved1..3
    }

    out.write_u32::<LE>(0x2).unwrap(); // LC_SYMTAB
    out.write_u32::<LE>(SYMTAB_CMD_LEN as u32).unwrap();
    out.write_u32::<LE>(symoff as u32).unwrap();
    out.write_u32::<LE>(symbols.len() as u32).unwrap();
    out.write_u32::<LE>(stroff as u32).unwrap();
    out.write_u32::<LE>(strs.len() as u32).unwrap();

    assert_eq!(out.len(), text_off);
    out.extend_from_slice(&tail);
    out
}

/// Fresh scratch directory for one test.
pub fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tblimg-{test}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
